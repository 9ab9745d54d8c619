use crate::item::{Author, AuthorDetail, BasketItem, Book, BookId, Genre, Profile, Role};
use crate::provider::api::{
    ApiError, BookQuery, Created, Credentials, FormPayload, PurchaseReceipt, Registration, ShopApi, Token,
};
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

/// 테스트용 백엔드
///
/// 호출을 기록하고, 지정한 호출을 실패시키거나 멈춰둘 수 있다.
/// 장바구니는 실제 서버처럼 상태를 가진다.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    gates: HashMap<&'static str, (Sender<()>, Receiver<()>)>,
    books: Vec<Book>,
    shelves: HashMap<&'static str, Vec<Book>>,
    favorites: Vec<Book>,
    basket: Vec<BasketItem>,
    genres: Vec<Genre>,
    authors: Vec<Author>,
    profile: Option<Profile>,
}

pub fn book(id: &str, title: &str, price: f64) -> Book {
    Book::builder().id(id).title(title).author_name("Author").price(price).build().unwrap()
}

impl FakeApi {
    pub fn new() -> Self {
        FakeApi::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.calls().iter()
            .filter(|c| c.as_str() == op || c.starts_with(&format!("{}:", op)))
            .count()
    }

    pub fn set_books(&self, books: Vec<Book>) {
        self.state.lock().unwrap().books = books;
    }

    /// `featured`, `new_releases`, `popular` 목록을 채운다.
    pub fn set_shelf(&self, name: &'static str, books: Vec<Book>) {
        self.state.lock().unwrap().shelves.insert(name, books);
    }

    pub fn set_favorites(&self, books: Vec<Book>) {
        self.state.lock().unwrap().favorites = books;
    }

    pub fn set_basket(&self, items: Vec<BasketItem>) {
        self.state.lock().unwrap().basket = items;
    }

    pub fn basket(&self) -> Vec<BasketItem> {
        self.state.lock().unwrap().basket.clone()
    }

    pub fn set_genres(&self, genres: Vec<Genre>) {
        self.state.lock().unwrap().genres = genres;
    }

    pub fn set_authors(&self, authors: Vec<Author>) {
        self.state.lock().unwrap().authors = authors;
    }

    pub fn set_profile(&self, profile: Profile) {
        self.state.lock().unwrap().profile = Some(profile);
    }

    /// 다음 `op` 호출을 `error`로 실패시킨다.
    pub fn fail_next(&self, op: &'static str, error: ApiError) {
        self.state.lock().unwrap()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// 다음 `op` 호출을 멈춘다. 호출이 시작되면 첫번째 수신자로 알림이 오고,
    /// 두번째 송신자로 신호를 보내야 호출이 진행된다.
    pub fn block_next(&self, op: &'static str) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        self.state.lock().unwrap().gates.insert(op, (entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    fn enter(&self, op: &'static str, call: String) -> Result<(), ApiError> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.gates.remove(op)
        };
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv();
        }

        let mut state = self.state.lock().unwrap();
        match state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn shelf(&self, name: &'static str) -> Result<Vec<Book>, ApiError> {
        self.enter(name, name.to_owned())?;
        let state = self.state.lock().unwrap();
        let favorites: Vec<&BookId> = state.favorites.iter().map(Book::id).collect();
        Ok(state.shelves.get(name)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut book| {
                if favorites.contains(&book.id()) {
                    book.set_favorite(true);
                }
                book
            })
            .collect())
    }

    fn find_book(state: &FakeState, id: &BookId) -> Book {
        state.books.iter()
            .chain(state.basket.iter().map(BasketItem::book))
            .find(|b| b.id() == id)
            .cloned()
            .unwrap_or_else(|| book(id.as_str(), &format!("Book {}", id), 0.0))
    }
}

impl ShopApi for FakeApi {
    fn register(&self, registration: &Registration) -> Result<Profile, ApiError> {
        self.enter("register", format!("register:{}", registration.email))?;
        Ok(Profile {
            id: 1,
            nickname: registration.nickname.clone(),
            email: registration.email.clone(),
            role: Role::Customer,
        })
    }

    fn login(&self, credentials: &Credentials) -> Result<Token, ApiError> {
        self.enter("login", format!("login:{}", credentials.email))?;
        Ok(Token {
            access_token: format!("token-{}", credentials.email),
            token_type: "bearer".to_owned(),
            nickname: None,
        })
    }

    fn profile(&self) -> Result<Profile, ApiError> {
        self.enter("profile", "profile".to_owned())?;
        self.state.lock().unwrap()
            .profile
            .clone()
            .ok_or_else(|| ApiError::NotFound { message: "User not found".to_owned() })
    }

    fn list_books(&self, query: &BookQuery) -> Result<Vec<Book>, ApiError> {
        let params: Vec<String> = query.pairs().iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.enter("list_books", format!("list_books:{}", params.join("&")))?;
        Ok(self.state.lock().unwrap().books.clone())
    }

    fn get_book(&self, id: &BookId) -> Result<Book, ApiError> {
        self.enter("get_book", format!("get_book:{}", id))?;
        self.state.lock().unwrap()
            .books
            .iter()
            .find(|b| b.id() == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound { message: "Book not found".to_owned() })
    }

    fn list_featured(&self) -> Result<Vec<Book>, ApiError> {
        self.shelf("featured")
    }

    fn list_new_releases(&self) -> Result<Vec<Book>, ApiError> {
        self.shelf("new_releases")
    }

    fn list_popular(&self) -> Result<Vec<Book>, ApiError> {
        self.shelf("popular")
    }

    fn list_genres(&self) -> Result<Vec<Genre>, ApiError> {
        self.enter("list_genres", "list_genres".to_owned())?;
        Ok(self.state.lock().unwrap().genres.clone())
    }

    fn list_authors(&self) -> Result<Vec<Author>, ApiError> {
        self.enter("list_authors", "list_authors".to_owned())?;
        Ok(self.state.lock().unwrap().authors.clone())
    }

    fn get_author(&self, id: u64) -> Result<AuthorDetail, ApiError> {
        self.enter("get_author", format!("get_author:{}", id))?;
        let state = self.state.lock().unwrap();
        let author = state.authors.iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound { message: format!("Author with id {} not found", id) })?;
        let books = state.books.iter()
            .filter(|b| b.author_name() == author.name())
            .cloned()
            .collect();
        Ok(AuthorDetail { author, books })
    }

    fn list_favorites(&self) -> Result<Vec<Book>, ApiError> {
        self.enter("list_favorites", "list_favorites".to_owned())?;
        Ok(self.state.lock().unwrap().favorites.clone())
    }

    fn add_favorite(&self, id: &BookId) -> Result<(), ApiError> {
        self.enter("add_favorite", format!("add_favorite:{}", id))?;
        let mut state = self.state.lock().unwrap();
        let mut favorite = Self::find_book(&state, id);
        favorite.set_favorite(true);
        state.favorites.push(favorite);
        Ok(())
    }

    fn remove_favorite(&self, id: &BookId) -> Result<(), ApiError> {
        self.enter("remove_favorite", format!("remove_favorite:{}", id))?;
        let mut state = self.state.lock().unwrap();
        let before = state.favorites.len();
        state.favorites.retain(|b| b.id() != id);
        if state.favorites.len() == before {
            return Err(ApiError::NotFound { message: "Book not in favorites".to_owned() });
        }
        Ok(())
    }

    fn get_basket(&self) -> Result<Vec<BasketItem>, ApiError> {
        self.enter("get_basket", "get_basket".to_owned())?;
        Ok(self.state.lock().unwrap().basket.clone())
    }

    fn add_basket_item(&self, id: &BookId, quantity: u32) -> Result<(), ApiError> {
        self.enter("add_basket_item", format!("add_basket_item:{}:{}", id, quantity))?;
        let mut state = self.state.lock().unwrap();
        let book = Self::find_book(&state, id);
        state.basket.retain(|item| item.id() != id);
        state.basket.push(BasketItem::new(book, quantity).map_err(|e| ApiError::Validation {
            status: 422,
            message: e.to_string(),
        })?);
        Ok(())
    }

    fn remove_basket_item(&self, id: &BookId) -> Result<(), ApiError> {
        self.enter("remove_basket_item", format!("remove_basket_item:{}", id))?;
        let mut state = self.state.lock().unwrap();
        let before = state.basket.len();
        state.basket.retain(|item| item.id() != id);
        if state.basket.len() == before {
            return Err(ApiError::NotFound { message: "Item not in basket".to_owned() });
        }
        Ok(())
    }

    fn purchase(&self) -> Result<PurchaseReceipt, ApiError> {
        self.enter("purchase", "purchase".to_owned())?;
        self.state.lock().unwrap().basket.clear();
        Ok(PurchaseReceipt { message: Some("Purchase completed".to_owned()) })
    }

    fn create_book(&self, payload: FormPayload) -> Result<Created, ApiError> {
        self.enter("create_book", format!("create_book:{}", payload.field("title").unwrap_or_default()))?;
        Ok(Created { title: payload.field("title").map(str::to_owned), ..Created::default() })
    }

    fn create_genre(&self, payload: FormPayload) -> Result<Created, ApiError> {
        self.enter("create_genre", format!("create_genre:{}", payload.field("name").unwrap_or_default()))?;
        Ok(Created { name: payload.field("name").map(str::to_owned), ..Created::default() })
    }

    fn create_author(&self, payload: FormPayload) -> Result<Created, ApiError> {
        self.enter("create_author", format!("create_author:{}", payload.field("name").unwrap_or_default()))?;
        Ok(Created { name: payload.field("name").map(str::to_owned), ..Created::default() })
    }
}
