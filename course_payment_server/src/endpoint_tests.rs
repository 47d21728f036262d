//! HTTP-level tests against a real (throwaway) SQLite database.
use actix_web::{
    http::StatusCode,
    test::{self, TestRequest},
    web,
    App,
};
use chrono::Duration;
use course_payment_engine::{
    db_types::{Cart, CartItemRef, CartStatus, Role, Setting},
    notify::LogNotifier,
    test_utils::{prepare_test_env, random_db_path, seed_course, seed_user},
    RecordApi,
    SettlementApi,
    SqliteDatabase,
};
use cpg_common::{Money, Secret};

use crate::{
    auth::{TokenIssuer, AUTH_HEADER},
    config::AuthConfig,
    data_objects::JsonResponse,
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

macro_rules! test_app {
    ($db:expr, $issuer:expr) => {{
        let settlement_api = SettlementApi::new($db.clone(), LogNotifier, "admin@example.com");
        let record_api = RecordApi::new($db.clone());
        test::init_service(
            App::new()
                .app_data(web::Data::new(settlement_api))
                .app_data(web::Data::new(record_api))
                .app_data(web::Data::new($issuer.clone()))
                .service(
                    web::scope("/api")
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
                        .service(MigrateSettingRoute::<SqliteDatabase>::new()),
                ),
        )
        .await
    }};
}

async fn setup() -> (SqliteDatabase, TokenIssuer) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let config = AuthConfig {
        jwt_secret: Secret::new("an-endpoint-test-secret-of-decent-length".to_string()),
        token_expiry: Duration::hours(1),
    };
    (db, TokenIssuer::new(&config))
}

#[actix_web::test]
async fn health_is_open() {
    let (db, issuer) = setup().await;
    let app = test_app!(db, issuer);
    let req = TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn protected_routes_require_a_token_and_the_right_role() {
    let (db, issuer) = setup().await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let app = test_app!(db, issuer);

    let req = TestRequest::get().uri("/api/setting").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let token = issuer.issue_token(student.id, Role::Student).unwrap();
    let req = TestRequest::get().uri("/api/setting").insert_header((AUTH_HEADER, token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn auth_issues_tokens_for_active_users_only() {
    let (db, issuer) = setup().await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let app = test_app!(db, issuer);

    let req = TestRequest::post().uri("/api/auth").set_json(serde_json::json!({ "user_id": student.id })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    let claims = issuer.validate_token(&token).expect("Issued token failed validation");
    assert_eq!(claims.sub, student.id);
    assert_eq!(claims.role, Role::Student);

    let req = TestRequest::post().uri("/api/auth").set_json(serde_json::json!({ "user_id": 99999 })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn cart_flow_over_http() {
    let (db, issuer) = setup().await;
    let admin = seed_user(&db, "Root", Role::Admin).await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(20_000), 10, instructor.id).await;
    let app = test_app!(db, issuer);
    let admin_token = issuer.issue_token(admin.id, Role::Admin).unwrap();
    let student_token = issuer.issue_token(student.id, Role::Student).unwrap();

    // The admin bootstraps the ledger. Doing it twice is a client error.
    let req =
        TestRequest::get().uri("/api/migrate/setting").insert_header((AUTH_HEADER, admin_token.clone())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let req =
        TestRequest::get().uri("/api/migrate/setting").insert_header((AUTH_HEADER, admin_token.clone())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/api/cart")
        .insert_header((AUTH_HEADER, student_token.clone()))
        .set_json(serde_json::json!({ "course_id": course.id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Cart = test::read_body_json(resp).await;
    assert_eq!(cart.status, CartStatus::New);

    // New -> Completed violates the whitelist and surfaces as a 400 with the error message in the body.
    let items = vec![CartItemRef { id: cart.id, cart_no: cart.cart_no.clone() }];
    let req = TestRequest::put()
        .uri("/api/cart/update-status")
        .insert_header((AUTH_HEADER, student_token.clone()))
        .set_json(serde_json::json!({ "status": "completed", "items": items }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid status change"));

    for status in ["waiting_paid", "completed"] {
        let items = vec![CartItemRef { id: cart.id, cart_no: cart.cart_no.clone() }];
        let req = TestRequest::put()
            .uri("/api/cart/update-status")
            .insert_header((AUTH_HEADER, student_token.clone()))
            .set_json(serde_json::json!({ "status": status, "items": items }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: JsonResponse = test::read_body_json(resp).await;
        assert!(body.success);
    }

    // The sale landed on the ledger: 200.00 less the 10% discount.
    let req = TestRequest::get().uri("/api/setting").insert_header((AUTH_HEADER, admin_token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let snapshot: serde_json::Value = test::read_body_json(resp).await;
    let setting: Setting = serde_json::from_value(snapshot["setting"].clone()).unwrap();
    assert_eq!(setting.balance_total, Money::from_cents(18_000));
    assert_eq!(snapshot["transactions"].as_array().unwrap().len(), 1);

    // Students cannot reach the instructor/admin search.
    let req = TestRequest::post()
        .uri("/api/purchase/search")
        .insert_header((AUTH_HEADER, student_token))
        .set_json(serde_json::json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
