use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use course_payment_engine::{notify::LogNotifier, RecordApi, SettlementApi, SqliteDatabase};

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        AuthRoute,
        CartSearchRoute,
        CartUpdateStatusRoute,
        CreateCartRoute,
        CreatePayoutRoute,
        DeleteCartRoute,
        MigrateSettingRoute,
        PayoutHistoryRoute,
        PayoutSearchRoute,
        PayoutUpdateStatusRoute,
        PurchaseSearchForStudentRoute,
        PurchaseSearchRoute,
        SettingRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let settlement_api = SettlementApi::new(db.clone(), LogNotifier, config.admin_email.clone());
        let record_api = RecordApi::new(db.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let api_scope = web::scope("/api")
            .service(health)
            .service(AuthRoute::<SqliteDatabase>::new())
            .service(CreateCartRoute::<SqliteDatabase>::new())
            .service(CartSearchRoute::<SqliteDatabase>::new())
            .service(CartUpdateStatusRoute::<SqliteDatabase>::new())
            .service(DeleteCartRoute::<SqliteDatabase>::new())
            .service(CreatePayoutRoute::<SqliteDatabase>::new())
            .service(PayoutUpdateStatusRoute::<SqliteDatabase>::new())
            .service(PayoutHistoryRoute::<SqliteDatabase>::new())
            .service(PayoutSearchRoute::<SqliteDatabase>::new())
            .service(PurchaseSearchRoute::<SqliteDatabase>::new())
            .service(PurchaseSearchForStudentRoute::<SqliteDatabase>::new())
            .service(SettingRoute::<SqliteDatabase>::new())
            .service(MigrateSettingRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(record_api))
            .app_data(web::Data::new(jwt_signer))
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
