use std::{error::Error as StdError, process, sync::Arc, time::Duration};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        comments::CommentService,
        error::AppError,
        feed::FeedService,
        follow::FollowService,
        groups::{CreateGroupCommand, GroupService},
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo, SessionsRepo,
            UsersRepo,
        },
    },
    cache::{CacheConfig, PageCache},
    config,
    domain::validation::SignupInput,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        media::MediaStorage,
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let mut chain = error.to_string();
    let mut source = StdError::source(error);
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }

    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args).await,
        config::Command::Users(args) => run_users(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;
    serve_http(&settings, state).await
}

async fn run_groups(settings: config::Settings, args: config::GroupsArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups_repo);

    match args.command {
        config::GroupsCommand::Create(create) => {
            let group = service
                .create(CreateGroupCommand {
                    title: create.title,
                    slug: create.slug,
                    description: create.description,
                })
                .await?;
            println!("{}\t{}", group.slug, group.title);
        }
        config::GroupsCommand::Delete(delete) => {
            let group = service.delete(&delete.slug).await?;
            info!(
                target = "yatube::groups",
                slug = %group.slug,
                "group deleted; its posts were kept without a group"
            );
        }
        config::GroupsCommand::List => {
            for group in service.list().await? {
                println!("{}\t{}", group.slug, group.title);
            }
        }
    }

    Ok(())
}

async fn run_users(settings: config::Settings, args: config::UsersArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories;
    let accounts = AccountService::new(users_repo, sessions_repo, settings.auth.session_ttl);

    match args.command {
        config::UsersCommand::Create(create) => {
            let user = accounts
                .signup(&SignupInput {
                    username: &create.username,
                    email: &create.email,
                    first_name: &create.first_name,
                    last_name: &create.last_name,
                    password1: &create.password,
                    password2: &create.password,
                })
                .await?;
            println!("{}\t{}", user.username, user.id);
        }
    }

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::Migrate)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();

    let follows = FollowService::new(follows_repo);
    let feed = FeedService::new(
        posts_repo.clone(),
        users_repo.clone(),
        groups_repo.clone(),
        comments_repo.clone(),
        follows.clone(),
        settings.pagination,
    );

    let media = MediaStorage::new(
        settings.uploads.directory.clone(),
        settings.uploads.max_request_bytes.get(),
    )
    .map_err(|err| InfraError::media_root(&settings.uploads.directory, err))?;

    let cache_config = CacheConfig::from(&settings.cache);
    if !cache_config.enabled {
        warn!(
            target = "yatube::cache",
            "page cache disabled; every index request renders"
        );
    }

    Ok(HttpState {
        feed: Arc::new(feed),
        follows: Arc::new(follows),
        posts: Arc::new(PostService::new(posts_repo.clone(), posts_write_repo, groups_repo)),
        comments: Arc::new(CommentService::new(posts_repo, comments_repo)),
        accounts: Arc::new(AccountService::new(
            users_repo,
            sessions_repo,
            settings.auth.session_ttl,
        )),
        page_cache: Arc::new(PageCache::new(cache_config)),
        media: Arc::new(media),
        health: repositories,
        secure_cookies: settings.auth.secure_cookies,
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.addr, err))?;

    info!(
        target = "yatube::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

/// Resolve on ctrl-c, then arm a hard deadline for in-flight requests.
async fn shutdown_signal(grace: Duration) {
    wait_for_shutdown(tokio::signal::ctrl_c(), grace).await;
}

/// A listener that fails to install never resolves, so the server keeps
/// running instead of shutting down at once.
async fn wait_for_shutdown<F>(signal: F, grace: Duration)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(err) = signal.await {
        error!(error = %err, "failed to listen for shutdown signal; serving until killed");
        std::future::pending::<()>().await;
    }

    info!(
        target = "yatube::serve",
        grace_seconds = grace.as_secs(),
        "shutdown requested"
    );

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(target = "yatube::serve", "graceful shutdown timed out");
        process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn failed_signal_listener_keeps_serving() {
        let failing = async { Err(std::io::Error::other("signal handler unavailable")) };
        let outcome = tokio::time::timeout(
            Duration::from_secs(24 * 60 * 60),
            wait_for_shutdown(failing, Duration::from_secs(1)),
        )
        .await;
        assert!(outcome.is_err(), "shutdown must not be triggered");
    }
}
