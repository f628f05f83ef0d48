mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use crm_db::entities::sea_orm_active_enums::Role;
use serde_json::json;

#[tokio::test]
async fn pagination_bounds_are_validated() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    for query in ["limit=0", "limit=101", "offset=-1", "limit=ten"] {
        let res = app.get(&format!("/customers?{query}"), &token).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{query}");
        assert_eq!(res.error_code(), "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn list_pages_search_and_sort() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    for (job, age) in [("Technician", 30), ("technician", 45), ("retired", 70)] {
        let res = app
            .post("/customers", &token, json!({ "job": job, "age": age }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let res = app.get("/customers?limit=2&offset=0", &token).await;
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["pagination"],
        json!({ "total": 3, "limit": 2, "offset": 0, "hasMore": true })
    );

    let res = app.get("/customers?limit=2&offset=2", &token).await;
    assert_eq!(res.json()["pagination"]["hasMore"], false);

    let res = app.get("/customers?q=TECH&sort=age:asc", &token).await;
    let body = res.json();
    let ages: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["age"].as_i64().unwrap())
        .collect();
    assert_eq!(ages, vec![30, 45]);
    assert_eq!(body["pagination"]["total"], 2);
}

#[tokio::test]
async fn typed_filters() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;
    app.post("/customers", &token, json!({ "leadStatus": "qualified" }))
        .await;
    app.post("/customers", &token, json!({ "leadStatus": "lost" }))
        .await;

    let res = app.get("/customers?leadStatus=qualified", &token).await;
    assert_eq!(res.json()["pagination"]["total"], 1);

    let res = app.get("/customers?leadStatus=maybe", &token).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get("/customers?assignedUserId=abc", &token).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ids_are_validated_and_missing_rows_are_404() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;

    for uri in ["/customers/abc", "/customers/0", "/customers/-1"] {
        let res = app.get(uri, &token).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{uri}");
    }

    let res = app.get("/customers/999", &token).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"]["message"], "customer with id 999 not found");
}

#[tokio::test]
async fn patch_distinguishes_null_from_absent() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;
    let created = app
        .post(
            "/customers",
            &token,
            json!({ "job": "services", "education": "tertiary", "balance": 1200.5 }),
        )
        .await
        .json();
    let id = created["data"]["customerId"].as_i64().unwrap();

    let res = app
        .request(
            Method::PATCH,
            &format!("/customers/{id}"),
            Some(&token),
            Some(json!({ "job": null, "leadStatus": "contacted" })),
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let data = &res.json()["data"];
    assert!(data["job"].is_null());
    assert_eq!(data["education"], "tertiary");
    assert_eq!(data["leadStatus"], "contacted");
    assert_eq!(data["balance"], 1200.5);

    let res = app
        .request(
            Method::PATCH,
            &format!("/customers/{id}"),
            Some(&token),
            Some(json!({ "createdAt": "2020-01-01T00:00:00Z" })),
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn role_policy() {
    let app = TestApp::new().await;
    let sales = app.login_as("sam", Role::Sales).await;
    let manager = app.login_as("meg", Role::Manager).await;
    let admin = app.login_as("ada", Role::Admin).await;

    let product = json!({ "productName": "Term deposit" });
    let res = app.post("/products", &sales, product.clone()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error_code(), "FORBIDDEN");
    assert_eq!(app.post("/products", &manager, product).await.status, StatusCode::CREATED);

    let team = json!({ "teamName": "North" });
    assert_eq!(app.post("/teams", &manager, team.clone()).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.post("/teams", &admin, team).await.status, StatusCode::CREATED);

    let user = json!({
        "username": "newbie",
        "email": "newbie@example.com",
        "password": "secret1",
        "role": "sales"
    });
    assert_eq!(app.post("/users", &manager, user.clone()).await.status, StatusCode::FORBIDDEN);
    let res = app.post("/users", &admin, user).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert!(res.json()["data"].get("passwordHash").is_none());

    let id = app
        .post("/customers", &sales, json!({}))
        .await
        .json()["data"]["customerId"]
        .as_i64()
        .unwrap();
    let uri = format!("/customers/{id}");
    let res = app.request(Method::DELETE, &uri, Some(&sales), None, &[]).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app.request(Method::DELETE, &uri, Some(&manager), None, &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["data"], json!({ "deleted": true }));
    let res = app.request(Method::DELETE, &uri, Some(&admin), None, &[]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn interactions_default_to_the_caller_and_check_references() {
    let app = TestApp::new().await;
    let token = app.login_as("alice", Role::Sales).await;
    let customer = app.post("/customers", &token, json!({})).await.json()["data"]["customerId"]
        .as_i64()
        .unwrap();

    let res = app
        .post(
            "/interactions",
            &token,
            json!({ "customerId": customer, "contactMethod": "phone", "outcome": "no_answer" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let data = &res.json()["data"];
    let me = app.get("/auth/me", &token).await.json()["data"]["userId"].clone();
    assert_eq!(data["userId"], me);

    let res = app
        .get(&format!("/customers/{customer}/interactions"), &token)
        .await;
    assert_eq!(res.json()["pagination"]["total"], 1);

    let res = app
        .post("/interactions", &token, json!({ "customerId": 4242 }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "FOREIGN_KEY_VIOLATION");
}

#[tokio::test]
async fn conversions_link_customers_and_products() {
    let app = TestApp::new().await;
    let token = app.login_as("meg", Role::Manager).await;
    let customer = app.post("/customers", &token, json!({})).await.json()["data"]["customerId"]
        .as_i64()
        .unwrap();
    let product = app
        .post("/products", &token, json!({ "productName": "Savings" }))
        .await
        .json()["data"]["productId"]
        .as_i64()
        .unwrap();

    let res = app
        .post(
            "/conversions",
            &token,
            json!({ "customerId": customer, "productId": product, "status": "pending" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    for uri in [
        format!("/products/{product}/conversions"),
        format!("/customers/{customer}/conversions"),
        "/conversions?status=pending".to_string(),
    ] {
        let res = app.get(&uri, &token).await;
        assert_eq!(res.json()["pagination"]["total"], 1, "{uri}");
    }

    let res = app
        .request(
            Method::DELETE,
            &format!("/products/{product}"),
            Some(&token),
            None,
            &[],
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "FOREIGN_KEY_VIOLATION");
}

#[tokio::test]
async fn team_membership_and_customers() {
    let app = TestApp::new().await;
    let admin = app.login_as("ada", Role::Admin).await;

    let res = app
        .post("/teams", &admin, json!({ "teamName": "South", "managerId": 999 }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let team = app
        .post("/teams", &admin, json!({ "teamName": "South" }))
        .await
        .json()["data"]["teamId"]
        .as_i64()
        .unwrap();
    let member = app
        .post(
            "/users",
            &admin,
            json!({
                "username": "Rep_One",
                "email": "rep@example.com",
                "password": "secret1",
                "role": "sales",
                "teamId": team
            }),
        )
        .await
        .json()["data"]
        .clone();
    assert_eq!(member["username"], "rep_one");

    app.post(
        "/customers",
        &admin,
        json!({ "assignedUserId": member["userId"] }),
    )
    .await;
    app.post("/customers", &admin, json!({})).await;

    let res = app.get(&format!("/teams/{team}/users"), &admin).await;
    assert_eq!(res.json()["pagination"]["total"], 1);
    let res = app.get(&format!("/teams/{team}/customers"), &admin).await;
    assert_eq!(res.json()["pagination"]["total"], 1);

    let res = app.get("/users?role=sales", &admin).await;
    assert_eq!(res.json()["pagination"]["total"], 1);
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let app = TestApp::new().await;
    let res = app
        .request(Method::GET, "/nowhere", None, None, &[])
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["success"], false);
}
