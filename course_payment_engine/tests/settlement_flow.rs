//! End-to-end settlement flows against a real (throwaway) SQLite database.
use cpg_common::Money;
use course_payment_engine::{
    db_types::{Actor, CartItemRef, CartStatus, PayoutStatus, PurchaseStatus, Role},
    objects::{CartQueryFilter, Pagination, PayoutQueryFilter, PurchaseQueryFilter},
    test_utils::{prepare_test_env, random_db_path, seed_course, seed_user, MemoryNotifier},
    traits::{RecordManagement, SettlementError},
    RecordApi,
    SettlementApi,
    SqliteDatabase,
};

const ADMIN_EMAIL: &str = "admin@example.com";

async fn new_test_api() -> (SettlementApi<SqliteDatabase, MemoryNotifier>, SqliteDatabase, MemoryNotifier) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let notifier = MemoryNotifier::new();
    let api = SettlementApi::new(db.clone(), notifier.clone(), ADMIN_EMAIL);
    api.bootstrap_ledger().await.expect("Error bootstrapping ledger");
    (api, db, notifier)
}

fn item(cart: &course_payment_engine::db_types::Cart) -> CartItemRef {
    CartItemRef { id: cart.id, cart_no: cart.cart_no.clone() }
}

#[tokio::test]
async fn full_settlement_flow() {
    let (api, db, notifier) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(20_000), 10, instructor.id).await;
    let student_actor = Actor::new(student.id, Role::Student);
    let instructor_actor = Actor::new(instructor.id, Role::Instructor);
    let admin = seed_user(&db, "Root", Role::Admin).await;
    let admin_actor = Actor::new(admin.id, Role::Admin);

    let cart = api.add_course_to_cart(student_actor, course.id).await.unwrap();
    assert_eq!(cart.status, CartStatus::New);

    api.update_cart_statuses(student_actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();
    let outcome = api.update_cart_statuses(student_actor, CartStatus::Completed, &[item(&cart)]).await.unwrap();
    assert_eq!(outcome.purchases.len(), 1);
    let purchase = &outcome.purchases[0];
    // 200.00 with a 10% discount
    assert_eq!(purchase.price_paid, Money::from_cents(18_000));
    assert_eq!(purchase.status, PurchaseStatus::New);
    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(18_000));
    let confirmation = notifier.sent().pop().expect("No purchase confirmation sent");
    assert_eq!(confirmation.to_mail, student.email);
    assert_eq!(confirmation.subject, "Buy courses success");
    assert!(confirmation.body.contains("Rust 101"));

    let payout = api.create_payout(instructor_actor, None, vec![purchase.id]).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::New);
    assert_eq!(payout.balance_origin, Money::from_cents(18_000));
    assert_eq!(payout.balance_instructor_received, Money::from_cents(12_600));
    assert_eq!(payout.balance_instructor_paid, Money::from_cents(5_400));
    let claimed = db.fetch_purchase(purchase.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, PurchaseStatus::RequestPaid);

    let payout = api.update_payout_status(instructor_actor, payout.id, PayoutStatus::RequestPayout, None).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::RequestPayout);
    let request_mail = notifier.sent().pop().expect("No payout request mail sent");
    assert_eq!(request_mail.to_mail, ADMIN_EMAIL);
    assert!(request_mail.body.contains(&payout.payout_no));

    let payout = api.update_payout_status(admin_actor, payout.id, PayoutStatus::Completed, None).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Completed);
    // 18 000 in, 12 600 paid out; the platform keeps its 30% share.
    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(5_400));
    let paid_instructor = db.fetch_active_user(instructor.id).await.unwrap().unwrap();
    assert_eq!(paid_instructor.balance_total, Money::from_cents(12_600));
    let settled = db.fetch_purchase(purchase.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PurchaseStatus::Completed);
    let history = db.fetch_payout_history(instructor.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].payout_no, payout.payout_no);
    assert_eq!(history[0].amount, Money::from_cents(12_600));
    let completion_mail = notifier.sent().pop().expect("No completion mail sent");
    assert_eq!(completion_mail.to_mail, instructor.email);
    assert!(completion_mail.body.contains("has been paid out"));

    // The ledger chains exactly, newest entry first.
    let snapshot = api.ledger_snapshot().await.unwrap();
    assert_eq!(snapshot.transactions.len(), 2);
    assert_eq!(snapshot.transactions[0].balance_old, Money::from_cents(18_000));
    assert_eq!(snapshot.transactions[0].balance_new, Money::from_cents(5_400));
    assert_eq!(snapshot.transactions[1].balance_old, Money::from_cents(0));
    assert_eq!(snapshot.transactions[1].balance_new, Money::from_cents(18_000));
}

#[tokio::test]
async fn cart_transition_whitelist_is_enforced() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(5_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();

    // New -> Completed skips the payment commitment and must abort.
    let err = api.update_cart_statuses(actor, CartStatus::Completed, &[item(&cart)]).await.unwrap_err();
    assert!(matches!(err, SettlementError::TransactionFailed(_)));
    assert!(err.to_string().contains("Invalid status change"));
    let unchanged = db.fetch_cart(cart.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, CartStatus::New);

    // Nothing may ever move back to New, whatever its current status.
    let err = api.update_cart_statuses(actor, CartStatus::New, &[item(&cart)]).await.unwrap_err();
    assert!(matches!(err, SettlementError::CartTargetNew));
}

#[tokio::test]
async fn pricing_is_frozen_at_waiting_paid() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 20, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();
    api.update_cart_statuses(actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();

    // The instructor hikes the price after the student committed. The sale must use the frozen snapshot.
    sqlx::query("UPDATE courses SET price = 99999, discount = 0 WHERE id = $1")
        .bind(course.id)
        .execute(db.pool())
        .await
        .unwrap();

    let outcome = api.update_cart_statuses(actor, CartStatus::Completed, &[item(&cart)]).await.unwrap();
    assert_eq!(outcome.purchases[0].price, Money::from_cents(10_000));
    assert_eq!(outcome.purchases[0].price_paid, Money::from_cents(8_000));
    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(8_000));
}

#[tokio::test]
async fn new_carts_show_the_current_course_price() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();
    assert_eq!(cart.price, Money::from_cents(10_000));

    sqlx::query("UPDATE courses SET price = 7500, discount = 20 WHERE id = $1")
        .bind(course.id)
        .execute(db.pool())
        .await
        .unwrap();

    let result = db.search_carts(CartQueryFilter::default().with_student_id(student.id), Pagination::default())
        .await
        .unwrap();
    assert_eq!(result.total_items, 1);
    assert_eq!(result.items[0].price, Money::from_cents(7_500));
    assert_eq!(result.items[0].discount, 20);
    assert_eq!(result.items[0].price_paid, Money::from_cents(6_000));
}

#[tokio::test]
async fn a_course_can_only_be_purchased_once() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(5_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();

    // A second cart for the same course is rejected while the first exists.
    let err = api.add_course_to_cart(actor, course.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::CourseAlreadyInCart(CartStatus::New)));

    api.update_cart_statuses(actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();
    api.update_cart_statuses(actor, CartStatus::Completed, &[item(&cart)]).await.unwrap();

    // And once purchased, it can never be added again.
    let err = api.add_course_to_cart(actor, course.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::AlreadyPurchased(_)));
}

#[tokio::test]
async fn instructors_cannot_buy_their_own_course() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(5_000), 0, instructor.id).await;
    let actor = Actor::new(instructor.id, Role::Instructor);

    let err = api.add_course_to_cart(actor, course.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::OwnCourseInCart));
}

#[tokio::test]
async fn batch_ledger_entries_chain_exactly() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let first = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let second = seed_course(&db, "Rust 201", Money::from_cents(4_000), 50, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart_a = api.add_course_to_cart(actor, first.id).await.unwrap();
    let cart_b = api.add_course_to_cart(actor, second.id).await.unwrap();
    let items = [item(&cart_a), item(&cart_b)];
    api.update_cart_statuses(actor, CartStatus::WaitingPaid, &items).await.unwrap();
    api.update_cart_statuses(actor, CartStatus::Completed, &items).await.unwrap();

    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(12_000));
    let snapshot = api.ledger_snapshot().await.unwrap();
    assert_eq!(snapshot.transactions.len(), 2);
    // Newest first: the second entry picks up exactly where the first ended.
    assert_eq!(snapshot.transactions[1].balance_old, Money::from_cents(0));
    assert_eq!(snapshot.transactions[1].balance_new, Money::from_cents(10_000));
    assert_eq!(snapshot.transactions[0].balance_old, Money::from_cents(10_000));
    assert_eq!(snapshot.transactions[0].balance_new, Money::from_cents(12_000));
}

#[tokio::test]
async fn a_failing_item_aborts_the_whole_batch() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let first = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let second = seed_course(&db, "Rust 201", Money::from_cents(4_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart_a = api.add_course_to_cart(actor, first.id).await.unwrap();
    let cart_b = api.add_course_to_cart(actor, second.id).await.unwrap();
    // Only the first cart is committed; completing both must fail on the second and roll back the first.
    api.update_cart_statuses(actor, CartStatus::WaitingPaid, &[item(&cart_a)]).await.unwrap();
    let err =
        api.update_cart_statuses(actor, CartStatus::Completed, &[item(&cart_a), item(&cart_b)]).await.unwrap_err();
    assert!(matches!(err, SettlementError::TransactionFailed(_)));

    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(0));
    let untouched = db.fetch_cart(cart_a.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, CartStatus::WaitingPaid);
}

#[tokio::test]
async fn purchases_cannot_be_claimed_twice() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let other = seed_user(&db, "Eve", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let student_actor = Actor::new(student.id, Role::Student);
    let instructor_actor = Actor::new(instructor.id, Role::Instructor);

    let cart = api.add_course_to_cart(student_actor, course.id).await.unwrap();
    api.update_cart_statuses(student_actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();
    let outcome = api.update_cart_statuses(student_actor, CartStatus::Completed, &[item(&cart)]).await.unwrap();
    let purchase_id = outcome.purchases[0].id;

    // Another instructor cannot claim someone else's sale.
    let err = api.create_payout(Actor::new(other.id, Role::Instructor), None, vec![purchase_id]).await.unwrap_err();
    assert!(matches!(err, SettlementError::CreateFailed(_)));
    assert!(err.to_string().contains("not owner"));

    api.create_payout(instructor_actor, None, vec![purchase_id]).await.unwrap();

    // The purchase is reserved now; a second payout over it must fail.
    let err = api.create_payout(instructor_actor, None, vec![purchase_id]).await.unwrap_err();
    assert!(matches!(err, SettlementError::CreateFailed(_)));
    let reserved = db.fetch_purchase(purchase_id).await.unwrap().unwrap();
    assert_eq!(reserved.status, PurchaseStatus::RequestPaid);
}

#[tokio::test]
async fn payout_verdicts_are_admin_only_and_rejections_need_a_comment() {
    let (api, db, notifier) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let admin = seed_user(&db, "Root", Role::Admin).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let student_actor = Actor::new(student.id, Role::Student);
    let instructor_actor = Actor::new(instructor.id, Role::Instructor);
    let admin_actor = Actor::new(admin.id, Role::Admin);

    let cart = api.add_course_to_cart(student_actor, course.id).await.unwrap();
    api.update_cart_statuses(student_actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();
    let outcome = api.update_cart_statuses(student_actor, CartStatus::Completed, &[item(&cart)]).await.unwrap();
    let payout = api.create_payout(instructor_actor, None, vec![outcome.purchases[0].id]).await.unwrap();
    api.update_payout_status(instructor_actor, payout.id, PayoutStatus::RequestPayout, None).await.unwrap();

    let err =
        api.update_payout_status(instructor_actor, payout.id, PayoutStatus::Completed, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::AdminOnlyTransition));

    let err = api.update_payout_status(admin_actor, payout.id, PayoutStatus::Rejected, Some("  ")).await.unwrap_err();
    assert!(matches!(err, SettlementError::RejectCommentRequired));

    let payout = api
        .update_payout_status(admin_actor, payout.id, PayoutStatus::Rejected, Some("Banking details are wrong"))
        .await
        .unwrap();
    assert_eq!(payout.status, PayoutStatus::Rejected);
    let mail = notifier.sent().pop().expect("No rejection mail sent");
    assert!(mail.body.contains("Banking details are wrong"));
    // Rejection moves no money.
    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(10_000));

    // The instructor may re-request after a rejection, and the admin may then complete.
    api.update_payout_status(instructor_actor, payout.id, PayoutStatus::RequestPayout, None).await.unwrap();
    let payout = api.update_payout_status(admin_actor, payout.id, PayoutStatus::Completed, None).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Completed);

    // Completing twice is rejected and the ledger is not debited again.
    let balance = api.fetch_ledger().await.unwrap().balance_total;
    let err = api.update_payout_status(admin_actor, payout.id, PayoutStatus::Completed, None).await.unwrap_err();
    assert!(matches!(err, SettlementError::PayoutAlreadyCompleted(_)));
    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, balance);
}

#[tokio::test]
async fn notification_failure_after_commit_is_a_hard_error() {
    let (api, db, notifier) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();
    api.update_cart_statuses(actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();

    notifier.fail_next();
    let err = api.update_cart_statuses(actor, CartStatus::Completed, &[item(&cart)]).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotificationFailed(_)));

    // The money has already moved; only the mail was lost.
    assert_eq!(api.fetch_ledger().await.unwrap().balance_total, Money::from_cents(10_000));
    let completed = db.fetch_cart(cart.id).await.unwrap().unwrap();
    assert_eq!(completed.status, CartStatus::Completed);
}

#[tokio::test]
async fn only_new_and_cancelled_carts_can_be_deleted() {
    let (api, db, _) = new_test_api().await;
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();
    api.update_cart_statuses(actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();
    let err = api.delete_cart(cart.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::CartNotDeletable));

    api.update_cart_statuses(actor, CartStatus::Cancel, &[item(&cart)]).await.unwrap();
    api.delete_cart(cart.id).await.unwrap();
    assert!(db.fetch_cart(cart.id).await.unwrap().is_none());
}

#[tokio::test]
async fn searches_are_scoped_to_the_acting_instructor() {
    let (api, db, _) = new_test_api().await;
    let records = RecordApi::new(db.clone());
    let ada = seed_user(&db, "Ada", Role::Instructor).await;
    let eve = seed_user(&db, "Eve", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let admin = seed_user(&db, "Root", Role::Admin).await;
    let student_actor = Actor::new(student.id, Role::Student);

    // One sale and one payout per instructor.
    for (name, owner_id) in [("Rust 101", ada.id), ("Go 101", eve.id)] {
        let course = seed_course(&db, name, Money::from_cents(10_000), 0, owner_id).await;
        let cart = api.add_course_to_cart(student_actor, course.id).await.unwrap();
        api.update_cart_statuses(student_actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap();
        let outcome = api.update_cart_statuses(student_actor, CartStatus::Completed, &[item(&cart)]).await.unwrap();
        api.create_payout(Actor::new(owner_id, Role::Instructor), None, vec![outcome.purchases[0].id])
            .await
            .unwrap();
    }

    // An instructor is locked to their own records, even when the filter asks for someone else's.
    let ada_actor = Actor::new(ada.id, Role::Instructor);
    let payouts = records
        .search_payouts(ada_actor, PayoutQueryFilter::default().with_instructor_id(eve.id), Pagination::default())
        .await
        .unwrap();
    assert_eq!(payouts.total_items, 1);
    assert_eq!(payouts.items[0].instructor_id, ada.id);
    let purchases =
        records.search_purchases(ada_actor, PurchaseQueryFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(purchases.total_items, 1);
    assert_eq!(purchases.items[0].instructor_id, ada.id);

    // The admin sees everything and may narrow to a single instructor.
    let admin_actor = Actor::new(admin.id, Role::Admin);
    let payouts = records.search_payouts(admin_actor, PayoutQueryFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(payouts.total_items, 2);
    let purchases = records
        .search_purchases(admin_actor, PurchaseQueryFilter::default().with_instructor_id(eve.id), Pagination::default())
        .await
        .unwrap();
    assert_eq!(purchases.total_items, 1);
    assert_eq!(purchases.items[0].instructor_id, eve.id);
}

#[tokio::test]
async fn settlement_requires_a_bootstrapped_ledger() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let api = SettlementApi::new(db.clone(), MemoryNotifier::new(), ADMIN_EMAIL);
    let instructor = seed_user(&db, "Ada", Role::Instructor).await;
    let student = seed_user(&db, "Sam", Role::Student).await;
    let course = seed_course(&db, "Rust 101", Money::from_cents(10_000), 0, instructor.id).await;
    let actor = Actor::new(student.id, Role::Student);

    let cart = api.add_course_to_cart(actor, course.id).await.unwrap();
    let err = api.update_cart_statuses(actor, CartStatus::WaitingPaid, &[item(&cart)]).await.unwrap_err();
    assert!(err.to_string().contains("Setting default not exist"));

    // Bootstrapping is one-shot.
    api.bootstrap_ledger().await.unwrap();
    let err = api.bootstrap_ledger().await.unwrap_err();
    assert!(matches!(err, SettlementError::LedgerAlreadyExists));
}
