use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::AuthSettings;
use crate::logger::RequestLogMiddleware;
use crate::middleware::SessionMiddleware;
use crate::routes::{
    change_password, channel_profile, current_user, health_check, login, logout, refresh, register,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    auth: AuthSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let auth_data = web::Data::new(auth.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(RequestLogMiddleware)
            // Shared state
            .app_data(connection.clone())
            .app_data(auth_data.clone())
            .service(
                web::scope("/api/v1")
                    // Public routes (no authentication required)
                    .route("/healthcheck", web::get().to(health_check))
                    .service(
                        web::scope("/users")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/refresh-token", web::post().to(refresh))
                            // Optional authentication: anonymous callers are
                            // served, authenticated callers get extra fields
                            .service(
                                web::scope("/c")
                                    .wrap(SessionMiddleware::optional(auth.clone()))
                                    .route("/{username}", web::get().to(channel_profile)),
                            )
                            // Protected routes (require a valid access token)
                            .service(
                                web::scope("")
                                    .wrap(SessionMiddleware::required(auth.clone()))
                                    .route("/logout", web::post().to(logout))
                                    .route("/current-user", web::get().to(current_user))
                                    .route("/change-password", web::post().to(change_password)),
                            ),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
