use std::{process, sync::Arc};

use folio::{
    application::{
        error::AppError,
        site::{BuildReport, SiteBuilder},
    },
    config::{self, BuildArgs, Command, Settings},
    infra::{
        http::{self, HttpState},
        offline::DirectoryNetwork,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Build(BuildArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Build(_) => run_build(settings).await.map(|_| ()),
        Command::Serve(args) => run_serve(settings, args.no_build).await,
        Command::Check(_) => run_check(settings).await,
        Command::Routes(_) => run_routes(settings),
    }
}

async fn run_build(settings: Settings) -> Result<BuildReport, AppError> {
    let builder = SiteBuilder::new(settings);
    let report = builder.build().await?;

    let network = Arc::new(DirectoryNetwork::new(
        &report.output_dir,
        &builder.settings().site.url,
    ));
    let install = builder.verify_offline(network, &report).await?;

    info!(
        target = "folio::build",
        output = %report.output_dir.display(),
        today = %report.today,
        pages = report.pages,
        posts = report.posts,
        external_posts = report.external_posts,
        tags = report.tags,
        assets = report.assets_copied,
        cache = %install.cache_name,
        precached = install.cached,
        "Build completed"
    );
    Ok(report)
}

async fn run_serve(settings: Settings, no_build: bool) -> Result<(), AppError> {
    if !no_build {
        run_build(settings.clone()).await?;
    }

    let state = HttpState::new(
        &settings.paths.output_dir,
        &settings.site,
        &settings.rate_limit,
    );
    let router = http::build_router(state);
    http::serve(router, settings.server.addr, settings.server.graceful_shutdown)
        .await
        .map_err(AppError::from)
}

async fn run_check(settings: Settings) -> Result<(), AppError> {
    let report = SiteBuilder::new(settings).check().await?;
    info!(
        target = "folio::check",
        posts = report.posts,
        drafts = report.drafts,
        external_posts = report.external_posts,
        experiences = report.experiences,
        warnings = report.warnings,
        "Content is valid"
    );
    Ok(())
}

fn run_routes(settings: Settings) -> Result<(), AppError> {
    let builder = SiteBuilder::new(settings);
    let plan = builder.route_plan()?;
    if plan.is_empty() {
        info!(
            target = "folio::routes",
            output = %builder.settings().paths.output_dir.display(),
            "Output directory is empty; run `folio build` first"
        );
    }
    for entry in plan {
        println!("{:<24} {}", entry.strategy.as_str(), entry.path);
    }
    Ok(())
}
