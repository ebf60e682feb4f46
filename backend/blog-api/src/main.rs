use std::io;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_core::jwt;
use blog_api::handlers::{posts, users};
use blog_api::services::MediaStorage;
use blog_api::Config;

async fn health_summary(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").fetch_one(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "blog-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "blog-api"
        })),
    }
}

/// Blog API
///
/// User registration/login with bearer-token auth and CRUD on posts.
///
/// # Routes
///
/// - `POST /api/users/register`, `POST /api/users/login` - public
/// - `GET /api/posts` - public listing with joined author fields
/// - `POST /api/posts`, `PUT|DELETE /api/posts/{id}` - authenticated,
///   mutation restricted to the post's author
/// - `/uploads/*` - statically served media files
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting blog-api v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Every authenticated route is unverifiable without the signing secret,
    // so refuse to serve at all rather than come up half-working.
    if let Err(e) = jwt::init(&config.auth.jwt_secret) {
        tracing::error!("JWT secret initialization failed: {}", e);
        eprintln!("ERROR: Failed to initialize JWT secret: {}", e);
        std::process::exit(1);
    }

    // Initialize database connection pool
    let db_pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {}", e);
            eprintln!("ERROR: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&db_pool).await {
        tracing::error!("Database migration failed: {}", e);
        eprintln!("ERROR: Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Connected to database, migrations applied");

    let media_storage = match MediaStorage::new(&config.media.upload_dir) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Upload directory setup failed: {}", e);
            eprintln!("ERROR: Failed to prepare upload directory: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let upload_dir = config.media.upload_dir.clone();

    HttpServer::new(move || {
        // Build CORS configuration
        let mut cors = Cors::default();
        for origin in config.cors.allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(media_storage.clone()))
            // The default payload cap is 256KiB; uploads need the full
            // media allowance plus multipart framing.
            .app_data(web::PayloadConfig::new(posts::MAX_UPLOAD_BYTES + 16 * 1024))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/api/health", web::get().to(health_summary))
            .service(
                web::scope("/api/users")
                    .route("/register", web::post().to(users::register))
                    .route("/login", web::post().to(users::login)),
            )
            .service(
                web::scope("/api/posts")
                    .service(
                        web::resource("")
                            .route(web::get().to(posts::list_posts))
                            .route(web::post().to(posts::create_post)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(posts::update_post))
                            .route(web::delete().to(posts::delete_post)),
                    ),
            )
            .service(Files::new("/uploads", upload_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
