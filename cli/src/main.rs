use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tunedin::api::{ApiClient, ApiError, BackendUser, NewConcert, SetlistInput, SetlistSong};
use tunedin::config::{
    AppConfig, ConfigError, DEFAULT_API_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REDIRECT_URI,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STORAGE_BUCKET, HttpTimeouts,
};
use tunedin::identity::{GoTrueClient, IdentityError, OAuthProvider, Session};
use tunedin::login::{LoginOutcome, LoginScreen};
use tunedin::nav::{GuardState, GuardedNavigator, MemoryNavigator, Navigator, Route, decide, visible_routes};
use tunedin::oauth::{BrowserOutcome, BrowserSession, OAuthHandoff};
use tunedin::session::SessionProvider;
use tunedin::storage::{ObjectStorage, PhotoUpload, StorageError};
use tunedin::sync::{BackendUserDirectory, SyncError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("{0}")]
    Login(String),
    #[error("not signed in; run `tunedin login` first")]
    NotSignedIn,
    #[error("invalid date '{0}'; expected RFC 3339 or YYYY-MM-DD")]
    InvalidDate(String),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "tunedin", about = "Concert log terminal client")]
struct Cli {
    #[arg(long, env = "TUNEDIN_AUTH_URL")]
    auth_url: String,

    #[arg(long, env = "TUNEDIN_AUTH_ANON_KEY")]
    anon_key: String,

    #[arg(long, env = "TUNEDIN_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, env = "TUNEDIN_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    redirect_uri: String,

    #[arg(long, env = "TUNEDIN_STORAGE_BUCKET", default_value = DEFAULT_STORAGE_BUCKET)]
    storage_bucket: String,

    #[arg(long, env = "TUNEDIN_SESSION_FILE", default_value = ".tunedin-session.json")]
    session_file: PathBuf,

    #[arg(long, env = "TUNEDIN_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "TUNEDIN_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig {
            auth_url: self.auth_url.clone(),
            anon_key: self.anon_key.clone(),
            api_url: self.api_url.clone(),
            redirect_uri: self.redirect_uri.clone(),
            storage_bucket: self.storage_bucket.clone(),
            session_file: Some(self.session_file.clone()),
            timeouts: HttpTimeouts {
                request_secs: self.request_timeout_secs,
                connect_secs: self.connect_timeout_secs,
            },
        }
        .normalized()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    Login(LoginCommand),
    Logout,
    /// Trade the refresh token for a fresh session.
    Refresh,
    Whoami,
    /// Show which screens are reachable and where the guard would send you.
    Routes {
        #[arg(long)]
        route: Option<Route>,
    },
    Concerts(ConcertsCommand),
    Photos(PhotosCommand),
    Setlists(SetlistsCommand),
    Notifications,
    Dashboard,
}

#[derive(Args, Debug)]
struct LoginCommand {
    #[command(subcommand)]
    command: LoginSubcommand,
}

#[derive(Subcommand, Debug)]
enum LoginSubcommand {
    Oauth {
        provider: OAuthProvider,
    },
    Password {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TUNEDIN_PASSWORD")]
        password: String,
    },
}

#[derive(Args, Debug)]
struct ConcertsCommand {
    #[command(subcommand)]
    command: ConcertsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ConcertsSubcommand {
    /// Your concerts with their photos.
    List,
    /// Every concert in the log.
    All,
    Create {
        #[arg(long)]
        artist: String,
        #[arg(long)]
        venue: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        tour: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Args, Debug)]
struct PhotosCommand {
    #[command(subcommand)]
    command: PhotosSubcommand,
}

#[derive(Subcommand, Debug)]
enum PhotosSubcommand {
    List {
        concert_id: String,
    },
    Upload {
        #[arg(long)]
        concert: String,
        file: PathBuf,
        #[arg(long)]
        caption: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SetlistsCommand {
    #[command(subcommand)]
    command: SetlistsSubcommand,
}

#[derive(Args, Debug)]
struct SongArgs {
    #[arg(long)]
    concert: Option<String>,
    /// Song title, repeatable.
    #[arg(long = "song")]
    songs: Vec<String>,
    /// Marks a song as a favorite, repeatable.
    #[arg(long = "favorite")]
    favorites: Vec<String>,
}

impl SongArgs {
    fn into_input(self) -> SetlistInput {
        let favorites = self.favorites;
        let songs = self
            .songs
            .into_iter()
            .map(|title| {
                let favorite = favorites.iter().any(|f| f == &title);
                SetlistSong { title, favorite }
            })
            .collect();
        SetlistInput { concert_id: self.concert, songs }
    }
}

#[derive(Subcommand, Debug)]
enum SetlistsSubcommand {
    List,
    Create(SongArgs),
    Update {
        setlist_id: String,
        #[command(flatten)]
        songs: SongArgs,
    },
}

/// Prints the authorization URL and reads the redirect back from stdin.
struct TerminalBrowser;

#[async_trait::async_trait]
impl BrowserSession for TerminalBrowser {
    async fn open_auth_session(&self, auth_url: &str, redirect_uri: &str) -> BrowserOutcome {
        eprintln!("Open this URL to sign in:\n\n  {auth_url}\n");
        eprintln!("Paste the final {redirect_uri} URL (empty line cancels):");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = stdin.read_line(&mut line).await {
            return BrowserOutcome::Failure(e.to_string());
        }
        let url = line.trim();
        if url.is_empty() {
            return BrowserOutcome::Cancel;
        }
        if !url.starts_with(redirect_uri) {
            return BrowserOutcome::Failure(format!("expected a redirect to {redirect_uri}"));
        }
        BrowserOutcome::Success { url: url.to_owned() }
    }
}

struct App {
    config: AppConfig,
    identity: Arc<GoTrueClient>,
    provider: SessionProvider,
    users: Arc<BackendUserDirectory>,
    api: ApiClient,
}

/// Signed-in context for protected commands.
struct Authed {
    session: Session,
    api: ApiClient,
    backend_user: BackendUser,
}

impl App {
    async fn start(config: AppConfig) -> Result<Self, CliError> {
        let identity = Arc::new(GoTrueClient::from_config(&config)?);
        let users = Arc::new(BackendUserDirectory::default());
        let provider = SessionProvider::with_user_directory(identity.clone(), users.clone());
        let api = ApiClient::from_config(&config)?;
        let state = provider.initialize().await;
        tracing::debug!(authenticated = state.is_authenticated(), "session resolved");
        Ok(Self { config, identity, provider, users, api })
    }

    fn login_screen(&self) -> LoginScreen {
        let handoff = OAuthHandoff::new(self.identity.clone(), Arc::new(TerminalBrowser), &self.config.redirect_uri)
            .with_backend_sync(self.api.clone(), Some(self.users.clone()));
        LoginScreen::new(handoff).with_auth_state(self.provider.subscribe())
    }

    fn navigator(&self, at: Route) -> GuardedNavigator<MemoryNavigator> {
        GuardedNavigator::new(MemoryNavigator::new(at), self.provider.subscribe())
    }

    /// A token the backend refuses means the stored session is dead, so
    /// drop it locally; other failures pass through.
    async fn expire_on_rejection(&self, e: IdentityError) -> CliError {
        if !e.is_rejection() {
            return e.into();
        }
        tracing::warn!(error = %e, "identity backend rejected the session; signing out");
        if let Err(e) = self.provider.sign_out().await {
            tracing::debug!(error = %e, "sign-out after rejection failed");
        }
        CliError::NotSignedIn
    }

    /// Enter a protected screen, failing if the guard bounces to login.
    async fn enter(&self, route: Route) -> Result<Authed, CliError> {
        let nav = self.navigator(route);
        if nav.current() == Route::Login {
            return Err(CliError::NotSignedIn);
        }
        let session = self.provider.state().session().cloned().ok_or(CliError::NotSignedIn)?;
        let api = self.api.clone().with_access_token(&session.access_token);
        let email = session.user.email.as_deref().ok_or(SyncError::MissingEmail)?;
        let backend_user = match self.users.lookup(&api, email).await {
            Ok(user) => user,
            Err(e) if e.status() == Some(404) => self.users.sync(&api, &session.user).await?,
            Err(e) => return Err(e.into()),
        };
        Ok(Authed { session, api, backend_user })
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let app = App::start(cli.config()?).await?;

    match cli.command {
        Command::Login(cmd) => login(&app, cmd.command).await,
        Command::Logout => {
            app.provider.sign_out().await?;
            println!("signed out");
            Ok(())
        }
        Command::Refresh => match app.identity.refresh_session().await {
            Ok(Some(session)) => print_json(&serde_json::json!({ "expiresAt": session.expires_at })),
            Ok(None) => Err(CliError::NotSignedIn),
            Err(e) => Err(app.expire_on_rejection(e).await),
        },
        Command::Whoami => {
            let reloaded = match app.identity.reload_user().await {
                Ok(session) => session,
                Err(e) => return Err(app.expire_on_rejection(e).await),
            };
            let authed = app.enter(Route::Profile).await?;
            let user = reloaded.map_or(authed.session.user, |s| s.user);
            print_json(&serde_json::json!({
                "user": user,
                "backendUser": authed.backend_user,
                "expiresAt": authed.session.expires_at,
            }))
        }
        Command::Routes { route } => {
            let state = app.provider.resolved().await;
            let guard = GuardState::from(&state);
            let report: Vec<_> = visible_routes(state.is_authenticated())
                .into_iter()
                .map(|r| serde_json::json!({ "path": r.path(), "title": r.title() }))
                .collect();
            let current = route.unwrap_or(Route::Index);
            print_json(&serde_json::json!({
                "authenticated": state.is_authenticated(),
                "visible": report,
                "route": current.path(),
                "redirect": decide(guard, current).map(Route::path),
            }))
        }
        Command::Concerts(cmd) => concerts(&app, cmd.command).await,
        Command::Photos(cmd) => photos(&app, cmd.command).await,
        Command::Setlists(cmd) => setlists(&app, cmd.command).await,
        Command::Notifications => {
            let authed = app.enter(Route::Notifications).await?;
            print_json(&authed.api.notifications_for_user(&authed.backend_user.id).await?)
        }
        Command::Dashboard => {
            let authed = app.enter(Route::Dashboard).await?;
            print_json(&authed.api.dashboard(&authed.backend_user.id).await?)
        }
    }
}

async fn login(app: &App, command: LoginSubcommand) -> Result<(), CliError> {
    let screen = app.login_screen();
    let mut nav = app.navigator(Route::Login);
    let outcome = match command {
        LoginSubcommand::Oauth { provider } => screen.sign_in_with_provider(provider, &mut nav).await,
        LoginSubcommand::Password { email, password } => screen.sign_in_with_password(&email, &password, &mut nav).await,
    };
    match outcome {
        LoginOutcome::SignedIn { backend_user } => {
            tracing::info!(route = %nav.current(), "signed in");
            print_json(&serde_json::json!({ "route": nav.current().path(), "backendUser": backend_user }))
        }
        LoginOutcome::Cancelled => {
            eprintln!("sign-in cancelled");
            Ok(())
        }
        LoginOutcome::Failed { message } => Err(CliError::Login(message)),
    }
}

async fn concerts(app: &App, command: ConcertsSubcommand) -> Result<(), CliError> {
    match command {
        ConcertsSubcommand::List => {
            let authed = app.enter(Route::UserConcerts).await?;
            print_json(&authed.api.concerts_with_photos(&authed.backend_user.id).await?)
        }
        ConcertsSubcommand::All => {
            let authed = app.enter(Route::ConcertLog).await?;
            print_json(&authed.api.list_concerts().await?)
        }
        ConcertsSubcommand::Create { artist, venue, date, tour, city, country, genre, notes } => {
            let authed = app.enter(Route::LogConcert).await?;
            let mut concert = NewConcert::new(&authed.backend_user.id, artist, venue, parse_date(&date)?);
            concert.tour_name = tour;
            concert.city = city;
            concert.country = country;
            concert.genre = genre;
            concert.notes = notes;
            print_json(&authed.api.create_concert(&concert).await?)
        }
    }
}

async fn photos(app: &App, command: PhotosSubcommand) -> Result<(), CliError> {
    match command {
        PhotosSubcommand::List { concert_id } => {
            let authed = app.enter(Route::UserConcerts).await?;
            print_json(&authed.api.photos_for_concert(&concert_id).await?)
        }
        PhotosSubcommand::Upload { concert, file, caption } => {
            let authed = app.enter(Route::UserConcerts).await?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned)
                .ok_or_else(|| StorageError::InvalidPath(file.display().to_string()))?;
            let bytes = tokio::fs::read(&file).await?;
            let storage = ObjectStorage::from_config(&app.config)?;
            let photo = storage
                .upload_concert_photo(
                    &authed.api,
                    PhotoUpload {
                        access_token: &authed.session.access_token,
                        user_id: &authed.backend_user.id,
                        concert_id: &concert,
                        file_name: &file_name,
                        bytes,
                        caption,
                    },
                )
                .await?;
            print_json(&photo)
        }
    }
}

async fn setlists(app: &App, command: SetlistsSubcommand) -> Result<(), CliError> {
    let authed = app.enter(Route::SetLists).await?;
    match command {
        SetlistsSubcommand::List => print_json(&authed.api.list_setlists().await?),
        SetlistsSubcommand::Create(songs) => print_json(&authed.api.create_setlist(&songs.into_input()).await?),
        SetlistsSubcommand::Update { setlist_id, songs } => {
            print_json(&authed.api.update_setlist(&setlist_id, &songs.into_input()).await?)
        }
    }
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, CliError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| CliError::InvalidDate(raw.to_owned()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
