use anyhow::{anyhow, Context, Result};
use book_shop_client::admin::{read_upload, AuthorForm, BookForm, EntryForm, FormController, GenreForm};
use book_shop_client::catalog::filter::{self, FilterKey};
use book_shop_client::catalog::reference::GenresView;
use book_shop_client::configs;
use book_shop_client::item::{self, BasketItem, Book, BookId};
use book_shop_client::navigation::{self, Location, Route};
use book_shop_client::provider::api::{Credentials, Registration};
use book_shop_client::provider::image::ImageKind;
use book_shop_client::session::SessionEvent;
use book_shop_client::view::ViewState;
use book_shop_client::{create_shop, Shop};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// 온라인 서점 클라이언트
#[derive(Parser, Debug)]
#[command(name = "book-shop", version, about = "Browse the book shop, manage favorites and the basket")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Register {
        #[arg(long)]
        nickname: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Log in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    Logout,

    Profile,

    /// List the catalog with filters.
    Shop {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        year: Option<String>,
        /// date or popularity
        #[arg(long)]
        sort: Option<String>,
        /// Raw query string, e.g. `genre_name=Fiction&year=2001`.
        #[arg(long)]
        query: Option<String>,
    },

    /// Show the featured, new and popular books.
    Info {
        /// Add this book to favorites first.
        #[arg(long)]
        favorite: Option<String>,
    },

    /// Search the catalog, genres or authors.
    Search {
        query: String,
        #[arg(long = "in", value_enum, default_value_t = SearchScope::Shop)]
        scope: SearchScope,
    },

    /// Show one book.
    Book { id: String },

    Genres {
        /// Open the catalog filtered by this genre.
        #[arg(long)]
        select: Option<String>,
    },

    Authors,

    /// Show an author with their books.
    Author { id: u64 },

    #[command(subcommand)]
    Favorites(FavoritesCommand),

    #[command(subcommand)]
    Basket(BasketCommand),

    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SearchScope {
    Shop,
    Genres,
    Authors,
}

#[derive(Subcommand, Debug)]
enum FavoritesCommand {
    List,
    Add { id: String },
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum BasketCommand {
    List,
    Add {
        id: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    Inc { id: String },
    Dec { id: String },
    Set { id: String, quantity: u32 },
    Remove { id: String },
    Purchase,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Book {
        #[arg(long, default_value = "")]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        author: String,
        #[arg(long, default_value = "")]
        genre: String,
        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        release_date: String,
        #[arg(long)]
        price: String,
        /// Cover image file.
        #[arg(long)]
        img: Option<PathBuf>,
    },
    Genre {
        #[arg(long)]
        name: String,
        #[arg(long)]
        img: Option<PathBuf>,
    },
    Author {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        info: String,
    },
}

fn main() -> Result<()> {
    configs::load_dotenv();
    let config = configs::load_config().context("Failed to load configuration")?;
    let _guard = configs::set_global_logging_config(&config).context("Failed to set up logging")?;

    let cli = Cli::parse();
    let shop = create_shop(&config).context("Failed to create API client")?;
    shop.session().subscribe(|event| {
        if event == SessionEvent::Expired {
            eprintln!("Session expired. Run `book-shop login` again.");
        }
    });

    run(&shop, cli.command)
}

fn run(shop: &Shop, command: Command) -> Result<()> {
    match command {
        Command::Register { nickname, email, password } => {
            let profile = shop.register(&Registration { nickname, email, password })?;
            println!("Registered as {} <{}>", profile.nickname, profile.email);
        }
        Command::Login { email, password } => {
            shop.login(&Credentials::new(email, password))?;
            let nickname = shop.session().nickname().unwrap_or_else(|| "user".to_owned());
            println!("Logged in as {}", nickname);
        }
        Command::Logout => {
            shop.logout()?;
            println!("Logged out");
        }
        Command::Profile => {
            let view = shop.profile();
            render(shop, &view.load(), |p| format!("{} <{}> ({})", p.nickname, p.email, p.role));
        }
        Command::Shop { title, author, genre, year, sort, query } => {
            let mut location = Location::parse(&format!("/shop?{}", query.unwrap_or_default()));
            let edits = [
                (FilterKey::Title, title),
                (FilterKey::AuthorName, author),
                (FilterKey::GenreName, genre),
                (FilterKey::Year, year),
                (FilterKey::SortBy, sort),
            ];
            for (key, value) in edits {
                if let Some(value) = value {
                    location = filter::apply_edit(&location, key, &value);
                }
            }
            shop.navigator().replace(location);
            show_catalog(shop);
        }
        Command::Info { favorite } => {
            let view = shop.info();
            shop.navigator().push(Route::Info.location());
            match favorite {
                Some(id) => view.add_to_favorites(&BookId::new(id))?,
                None => {
                    view.load();
                }
            }
            render(shop, &view.state(), |shelf| {
                let mut lines = vec![shelf.section.title().to_owned()];
                lines.extend(shelf.books.iter().map(|book| format!("  {}", book_line(book))));
                lines.join("\n")
            });
        }
        Command::Search { query, scope } => {
            let current = match scope {
                SearchScope::Shop => Route::Shop,
                SearchScope::Genres => Route::Genres,
                SearchScope::Authors => Route::Authors,
            };
            let location = navigation::search_location(&current, &query)
                .ok_or_else(|| anyhow!("Search query is empty"))?;
            shop.navigator().push(location.clone());
            match scope {
                SearchScope::Shop => show_catalog(shop),
                SearchScope::Genres => render(shop, &shop.genres().load(&location), |g| g.name().to_owned()),
                SearchScope::Authors => render(shop, &shop.authors().load(&location), |a| a.name().to_owned()),
            }
        }
        Command::Book { id } => {
            let view = shop.book();
            render(shop, &view.load(&BookId::new(id)), |book| {
                let cover = shop.image(book.img(), ImageKind::Book);
                format!("{}\n  {}\n  cover: {}", book_line(book), book.description(), cover.url())
            });
        }
        Command::Genres { select } => {
            let view = shop.genres();
            let state = view.load(&Route::Genres.location());
            match select {
                Some(name) => {
                    let genre = state.items().iter()
                        .find(|genre| genre.name().eq_ignore_ascii_case(name.trim()))
                        .ok_or_else(|| anyhow!("Unknown genre: {}", name))?;
                    shop.navigator().push(GenresView::shop_location(genre));
                    show_catalog(shop);
                }
                None => render(shop, &state, |g| {
                    format!("{:>4}  {}  {}", g.id(), g.name(), shop.image(g.img(), ImageKind::Genre).url())
                }),
            }
        }
        Command::Authors => {
            let location = Route::Authors.location();
            render(shop, &shop.authors().load(&location), |a| format!("{:>4}  {}", a.id(), a.name()));
        }
        Command::Author { id } => {
            let view = shop.author();
            render(shop, &view.load(id), |detail| {
                let mut lines = vec![detail.author.name().to_owned()];
                lines.extend(detail.author.info().map(str::to_owned));
                lines.extend(detail.books.iter().map(|book| format!("  {}", book_line(book))));
                lines.join("\n")
            });
        }
        Command::Favorites(command) => favorites(shop, command)?,
        Command::Basket(command) => basket(shop, command)?,
        Command::Admin(command) => admin(shop, command)?,
    }
    Ok(())
}

fn favorites(shop: &Shop, command: FavoritesCommand) -> Result<()> {
    match command {
        FavoritesCommand::List => {
            render(shop, &shop.favorites().load(), book_line);
        }
        FavoritesCommand::Add { id } => {
            let view = shop.book();
            let id = BookId::new(id);
            if let Some(error) = view.load(&id).error() {
                return Err(anyhow!("{}", error));
            }
            if view.book().is_some_and(|book| book.is_favorite()) {
                println!("Already in favorites");
            } else {
                view.toggle_favorite()?;
                println!("Added to favorites");
            }
        }
        FavoritesCommand::Remove { id } => {
            let view = shop.favorites();
            view.load();
            view.remove(&BookId::new(id))?;
            render(shop, &view.state(), book_line);
        }
    }
    Ok(())
}

fn basket(shop: &Shop, command: BasketCommand) -> Result<()> {
    let basket = shop.basket();
    if let BasketCommand::Add { id, quantity } = &command {
        let view = shop.book();
        if let Some(error) = view.load(&BookId::new(id.as_str())).error() {
            return Err(anyhow!("{}", error));
        }
        view.add_to_basket(*quantity)?;
    }

    basket.load();
    match command {
        BasketCommand::List | BasketCommand::Add { .. } => {}
        BasketCommand::Inc { id } => {
            basket.increment(&BookId::new(id))?;
        }
        BasketCommand::Dec { id } => {
            basket.decrement(&BookId::new(id))?;
        }
        BasketCommand::Set { id, quantity } => {
            basket.update_quantity(&BookId::new(id), quantity)?;
        }
        BasketCommand::Remove { id } => {
            basket.remove(&BookId::new(id))?;
        }
        BasketCommand::Purchase => {
            let receipt = basket.purchase()?;
            println!("{}", receipt.message.unwrap_or_else(|| "Purchase completed".to_owned()));
        }
    }

    let state = basket.state();
    render(shop, &state, basket_line);
    if !state.items().is_empty() {
        println!("Total: {:.2}", item::total_price(state.items()));
    }
    Ok(())
}

fn admin(shop: &Shop, command: AdminCommand) -> Result<()> {
    let panel = shop.admin();
    let confirmation = match command {
        AdminCommand::Book { id, title, description, author, genre, release_date, price, img } => {
            let img = img.map(read_upload).transpose()?;
            submit(&panel.book, BookForm {
                id,
                title,
                description,
                author_name: author,
                genre_name: genre,
                release_date,
                price,
                img,
            })?
        }
        AdminCommand::Genre { name, img } => {
            let img = img.map(read_upload).transpose()?;
            submit(&panel.genre, GenreForm { name, img })?
        }
        AdminCommand::Author { name, info } => submit(&panel.author, AuthorForm { name, info })?,
    };
    println!("{}", confirmation);
    Ok(())
}

fn submit<F: EntryForm>(form: &FormController<F>, fields: F) -> Result<String> {
    form.edit(|current| *current = fields);
    form.submit().map_err(|err| anyhow!("Error: {}", err.detail()))
}

fn show_catalog(shop: &Shop) {
    let catalog = shop.catalog();
    let state = catalog.on_navigation();
    println!("{}", shop.navigator().current());
    render(shop, &state, book_line);
    if state.is_empty() && catalog.has_active_filters() {
        println!("Try `book-shop shop` without filters to reset them.");
    }
}

fn render<T, F: Fn(&T) -> String>(shop: &Shop, state: &ViewState<T>, line: F) {
    match state {
        ViewState::Idle if shop.navigator().current_route() == Route::Login => {
            println!("Login required. Run `book-shop login` first.")
        }
        ViewState::Idle => {}
        ViewState::Loading => println!("Loading..."),
        ViewState::Empty => println!("No results."),
        ViewState::Failed(message) => eprintln!("Error: {}", message),
        ViewState::Loaded(items) => items.iter().for_each(|item| println!("{}", line(item))),
    }
}

fn book_line(book: &Book) -> String {
    let favorite = if book.is_favorite() { "*" } else { " " };
    format!(
        "{} [{}] {} / {} / {}  {:.2}  ({} favorites)",
        favorite,
        book.id(),
        book.title(),
        book.author_name(),
        book.genre_name(),
        book.price(),
        book.favorites_count()
    )
}

fn basket_line(item: &BasketItem) -> String {
    format!(
        "[{}] {} x{}  {:.2}",
        item.id(),
        item.book().title(),
        item.quantity(),
        item.line_total()
    )
}
