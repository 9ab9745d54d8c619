use crate::navigation::{self, Navigator};
use crate::provider::api::{ApiError, Created, FileUpload, FormPayload, ShopApi};
use crate::session::SessionStore;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Login required")]
    LoginRequired,

    #[error("{0} is required")]
    Required(&'static str),

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Submission is already in progress")]
    Submitting,

    #[error("Failed to read {path}: {source}")]
    File { path: String, source: std::io::Error },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl FormError {
    /// 화면에 보여줄 메시지, 서버 에러는 서버가 내려준 상세 메시지를 사용한다.
    pub fn detail(&self) -> String {
        match self {
            FormError::Api(err) => err.message().to_owned(),
            other => other.to_string(),
        }
    }
}

/// 업로드할 파일을 읽는다. MIME 타입은 확장자로 정한다.
pub fn read_upload<P: AsRef<Path>>(path: P) -> Result<FileUpload, FormError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| FormError::File { path: path.display().to_string(), source })?;
    let file_name = path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_owned());
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned();
    Ok(FileUpload { file_name, mime, bytes })
}

/// 관리자 등록 폼
pub trait EntryForm: Clone + Default + Send {
    /// 확인 메시지에 쓰일 엔티티 이름
    const ENTITY: &'static str;

    /// 입력값을 검증하고 멀티파트 본문으로 변환한다. 비어있는 값은 전송하지 않는다.
    fn to_payload(&self) -> Result<FormPayload, FormError>;

    /// 응답에 이름이 없을 때 확인 메시지에 대신 쓰일 입력값
    fn label(&self) -> &str;

    fn send(api: &dyn ShopApi, payload: FormPayload) -> Result<Created, ApiError>;

    fn created_label(created: &Created) -> Option<&str>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookForm {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author_name: String,
    pub genre_name: String,
    /// `YYYY-MM-DD`
    pub release_date: String,
    pub price: String,
    pub img: Option<FileUpload>,
}

impl EntryForm for BookForm {
    const ENTITY: &'static str = "Book";

    fn to_payload(&self) -> Result<FormPayload, FormError> {
        let price = self.price.trim();
        if price.is_empty() {
            return Err(FormError::Required("price"));
        }
        match price.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => {}
            _ => return Err(FormError::Invalid { field: "price", message: format!("{} is not a non-negative number", price) }),
        }

        let release_date = self.release_date.trim();
        if !release_date.is_empty() && NaiveDate::parse_from_str(release_date, "%Y-%m-%d").is_err() {
            return Err(FormError::Invalid { field: "release_date", message: format!("{} is not YYYY-MM-DD", release_date) });
        }

        Ok(FormPayload::new()
            .text("id", &self.id)
            .text("title", &self.title)
            .text("description", &self.description)
            .text("author_name", &self.author_name)
            .text("genre_name", &self.genre_name)
            .text("release_date", release_date)
            .text("price", price)
            .file("img", self.img.clone()))
    }

    fn label(&self) -> &str {
        &self.title
    }

    fn send(api: &dyn ShopApi, payload: FormPayload) -> Result<Created, ApiError> {
        api.create_book(payload)
    }

    fn created_label(created: &Created) -> Option<&str> {
        created.title.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreForm {
    pub name: String,
    pub img: Option<FileUpload>,
}

impl EntryForm for GenreForm {
    const ENTITY: &'static str = "Genre";

    fn to_payload(&self) -> Result<FormPayload, FormError> {
        if self.name.trim().is_empty() {
            return Err(FormError::Required("name"));
        }
        Ok(FormPayload::new()
            .text("name", &self.name)
            .file("img", self.img.clone()))
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn send(api: &dyn ShopApi, payload: FormPayload) -> Result<Created, ApiError> {
        api.create_genre(payload)
    }

    fn created_label(created: &Created) -> Option<&str> {
        created.name.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorForm {
    pub name: String,
    pub info: String,
}

impl EntryForm for AuthorForm {
    const ENTITY: &'static str = "Author";

    fn to_payload(&self) -> Result<FormPayload, FormError> {
        if self.name.trim().is_empty() {
            return Err(FormError::Required("name"));
        }
        Ok(FormPayload::new()
            .text("name", &self.name)
            .text("info", &self.info))
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn send(api: &dyn ShopApi, payload: FormPayload) -> Result<Created, ApiError> {
        api.create_author(payload)
    }

    fn created_label(created: &Created) -> Option<&str> {
        created.name.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormStatus {
    Editing,
    Submitting,
    Confirmed(String),
    Failed(String),
}

struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 등록 폼 하나의 상태
///
/// 제출 중에는 다시 제출 할 수 없다. 성공하면 입력값을 비우고 확인 메시지를 보여주고,
/// 실패하면 입력값을 그대로 두어 수정 후 다시 제출 할 수 있게 한다.
pub struct FormController<F: EntryForm> {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    fields: Mutex<F>,
    status: Mutex<FormStatus>,
    submitting: AtomicBool,
}

impl<F: EntryForm> FormController<F> {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        FormController {
            api,
            session,
            navigator,
            fields: Mutex::new(F::default()),
            status: Mutex::new(FormStatus::Editing),
            submitting: AtomicBool::new(false),
        }
    }

    fn fields_lock(&self) -> MutexGuard<'_, F> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: FormStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn fields(&self) -> F {
        self.fields_lock().clone()
    }

    pub fn edit<E: FnOnce(&mut F)>(&self, edit: E) {
        edit(&mut self.fields_lock());
    }

    pub fn status(&self) -> FormStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// 폼을 제출하고 확인 메시지를 반환한다.
    pub fn submit(&self) -> Result<String, FormError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(FormError::LoginRequired);
        }
        if self.submitting.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(FormError::Submitting);
        }
        let _guard = SubmitGuard(&self.submitting);

        let fields = self.fields();
        let result = fields.to_payload()
            .and_then(|payload| {
                self.set_status(FormStatus::Submitting);
                F::send(self.api.as_ref(), payload).map_err(FormError::from)
            });

        match result {
            Ok(created) => {
                let label = F::created_label(&created).unwrap_or_else(|| fields.label());
                let confirmation = format!("{} \"{}\" created!", F::ENTITY, label);
                info!(entity = F::ENTITY, label, "Created");
                *self.fields_lock() = F::default();
                self.set_status(FormStatus::Confirmed(confirmation.clone()));
                Ok(confirmation)
            }
            Err(err) => {
                error!(entity = F::ENTITY, error = %err, "Failed to create");
                self.set_status(FormStatus::Failed(err.detail()));
                Err(err)
            }
        }
    }
}

/// 관리자 화면, 책, 장르, 저자 등록 폼으로 구성된다.
pub struct AdminPanel {
    pub book: FormController<BookForm>,
    pub genre: FormController<GenreForm>,
    pub author: FormController<AuthorForm>,
}

impl AdminPanel {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        AdminPanel {
            book: FormController::new(api.clone(), session.clone(), navigator.clone()),
            genre: FormController::new(api.clone(), session.clone(), navigator.clone()),
            author: FormController::new(api, session, navigator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Route;
    use crate::session::storage::MemoryStorage;
    use crate::session::Session;
    use crate::testing::FakeApi;
    use std::io::Write;

    fn panel(api: Arc<FakeApi>, logged_in: bool) -> (AdminPanel, Arc<Navigator>) {
        let storage = if logged_in {
            MemoryStorage::with_session(Session::new("abc"))
        } else {
            MemoryStorage::new()
        };
        let session = Arc::new(SessionStore::open(Box::new(storage)));
        let navigator = Arc::new(Navigator::default());
        (AdminPanel::new(api, session, navigator.clone()), navigator)
    }

    fn dune() -> BookForm {
        BookForm {
            id: "b1".to_owned(),
            title: "Dune".to_owned(),
            author_name: "Frank Herbert".to_owned(),
            price: "1000".to_owned(),
            ..BookForm::default()
        }
    }

    #[test]
    fn book_payload_skips_empty_fields() {
        let payload = dune().to_payload().unwrap();

        let keys: Vec<&str> = payload.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "title", "author_name", "price"]);
        assert!(payload.files().is_empty());
    }

    #[test]
    fn book_price_is_required_and_non_negative() {
        let mut form = dune();
        form.price = " ".to_owned();
        assert!(matches!(form.to_payload(), Err(FormError::Required("price"))));

        form.price = "-1".to_owned();
        assert!(matches!(form.to_payload(), Err(FormError::Invalid { field: "price", .. })));

        form.price = "abc".to_owned();
        assert!(matches!(form.to_payload(), Err(FormError::Invalid { field: "price", .. })));
    }

    #[test]
    fn book_release_date_must_be_a_date() {
        let mut form = dune();
        form.release_date = "2024-13-01".to_owned();

        assert!(matches!(form.to_payload(), Err(FormError::Invalid { field: "release_date", .. })));
    }

    #[test]
    fn successful_submit_confirms_and_clears() {
        let api = Arc::new(FakeApi::new());
        let (panel, _) = panel(api.clone(), true);
        panel.book.edit(|form| *form = dune());

        let confirmation = panel.book.submit().unwrap();

        assert_eq!(confirmation, "Book \"Dune\" created!");
        assert_eq!(panel.book.status(), FormStatus::Confirmed(confirmation));
        assert_eq!(panel.book.fields(), BookForm::default());
        assert!(!panel.book.is_submitting());
        assert_eq!(api.calls(), vec!["create_book:Dune"]);
    }

    #[test]
    fn failed_submit_keeps_fields_and_shows_server_detail() {
        let api = Arc::new(FakeApi::new());
        api.fail_next("create_genre", ApiError::from_status(400, "Genre already exists".into()));
        let (panel, _) = panel(api, true);
        panel.genre.edit(|form| form.name = "Fantasy".to_owned());

        assert!(panel.genre.submit().is_err());

        assert_eq!(panel.genre.status(), FormStatus::Failed("Genre already exists".to_owned()));
        assert_eq!(panel.genre.fields().name, "Fantasy");
        assert!(!panel.genre.is_submitting());
    }

    #[test]
    fn invalid_form_is_not_sent() {
        let api = Arc::new(FakeApi::new());
        let (panel, _) = panel(api.clone(), true);

        assert!(matches!(panel.author.submit(), Err(FormError::Required("name"))));

        assert!(api.calls().is_empty());
        assert_eq!(panel.author.status(), FormStatus::Failed("name is required".to_owned()));
    }

    #[test]
    fn author_info_is_optional() {
        let api = Arc::new(FakeApi::new());
        let (panel, _) = panel(api, true);
        panel.author.edit(|form| form.name = "Ursula K. Le Guin".to_owned());

        assert_eq!(panel.author.submit().unwrap(), "Author \"Ursula K. Le Guin\" created!");
    }

    #[test]
    fn anonymous_submit_redirects_to_login() {
        let api = Arc::new(FakeApi::new());
        let (panel, navigator) = panel(api.clone(), false);
        panel.genre.edit(|form| form.name = "Fantasy".to_owned());

        assert!(matches!(panel.genre.submit(), Err(FormError::LoginRequired)));
        assert_eq!(navigator.current_route(), Route::Login);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn upload_is_read_with_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.PNG");
        fs::File::create(&path).unwrap().write_all(b"png").unwrap();

        let upload = read_upload(&path).unwrap();

        assert_eq!(upload.file_name, "cover.PNG");
        assert_eq!(upload.mime, "image/png");
        assert_eq!(upload.bytes, b"png");
        assert!(matches!(read_upload(dir.path().join("missing.jpg")), Err(FormError::File { .. })));
    }

    #[test]
    fn upload_mime_covers_vector_images_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let svg = dir.path().join("cover.svg");
        let raw = dir.path().join("cover.xyzzy");
        fs::write(&svg, b"<svg/>").unwrap();
        fs::write(&raw, b"raw").unwrap();

        assert_eq!(read_upload(&svg).unwrap().mime, "image/svg+xml");
        assert_eq!(read_upload(&raw).unwrap().mime, "application/octet-stream");
    }
}
