// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin panel tests: auth, discount codes, reports and maintenance.

use assurly::models::{
    AnalysisStatus, Document, DocumentType, DiscountUsage, InsuranceData, Tier,
};
use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

mod common;
use common::{
    admin_login, empty_request, json_body, json_request, register, send, text_file, upload,
    ADMIN_EMAIL, ADMIN_PASSWORD,
};

#[tokio::test]
async fn test_admin_routes_require_admin_session() {
    let (app, _) = common::create_test_app();

    for uri in [
        "/api/admin/me",
        "/api/admin/customers",
        "/api/admin/discount-codes",
        "/api/admin/discount-usage",
        "/api/admin/insurance-data/stats",
    ] {
        let response = send(&app, empty_request("GET", uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = send(&app, empty_request("POST", "/api/admin/cleanup", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_session_is_not_admin() {
    let (app, _) = common::create_test_app();
    let cookie = register(&app, "customer@example.com", None).await;

    let response = send(&app, empty_request("GET", "/api/admin/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_login_and_me() {
    let (app, state) = common::create_test_app();
    let cookie = admin_login(&app).await;

    let response = send(&app, empty_request("GET", "/api/admin/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["email"], ADMIN_EMAIL);
    assert_eq!(body["role"], "super_admin");
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("resetToken").is_none());

    let admin = state.db.get_admin_user_by_email(ADMIN_EMAIL).unwrap();
    assert!(admin.last_login_at.is_some());
}

#[tokio::test]
async fn test_admin_login_rejects_bad_credentials() {
    let (app, _) = common::create_test_app();

    for body in [
        json!({"email": ADMIN_EMAIL, "password": "not-the-password"}),
        json!({"email": "nobody@assurly.io", "password": ADMIN_PASSWORD}),
    ] {
        let response = send(&app, json_request("POST", "/api/admin/login", None, body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_admin_logout_keeps_customer_login() {
    let (app, _) = common::create_test_app();
    let customer = register(&app, "both@example.com", None).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/login",
            Some(&customer),
            json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}),
        ),
    )
    .await;
    let both = common::session_cookie(&response).unwrap();

    let response = send(&app, empty_request("POST", "/api/admin/logout", Some(&both))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let after = common::session_cookie(&response).unwrap();

    let response = send(&app, empty_request("GET", "/api/admin/me", Some(&after))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = send(&app, empty_request("GET", "/api/user", Some(&after))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_discount_code_lifecycle() {
    let (app, state) = common::create_test_app();
    let cookie = admin_login(&app).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/discount-codes",
            Some(&cookie),
            json!({"code": "partner-25", "discountPercentage": 25.0, "description": "Partner"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["code"], "PARTNER-25");
    assert_eq!(created["isActive"], true);
    let id = created["id"].as_u64().unwrap();

    let admin = state.db.get_admin_user_by_email(ADMIN_EMAIL).unwrap();
    assert_eq!(state.db.get_discount_code(id).unwrap().created_by, Some(admin.id));

    // Codes are unique regardless of case
    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/discount-codes",
            Some(&cookie),
            json!({"code": "Partner-25", "discountPercentage": 10.0}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/admin/discount-codes/{}/status", id),
            Some(&cookie),
            json!({"isActive": false}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["isActive"], false);

    let list = json_body(
        send(
            &app,
            empty_request("GET", "/api/admin/discount-codes", Some(&cookie)),
        )
        .await,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let response = send(
        &app,
        empty_request(
            "DELETE",
            &format!("/api/admin/discount-codes/{}", id),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.db.get_discount_code_by_code("PARTNER-25").is_none());

    let response = send(
        &app,
        empty_request(
            "DELETE",
            &format!("/api/admin/discount-codes/{}", id),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_discount_code_validation() {
    let (app, _) = common::create_test_app();
    let cookie = admin_login(&app).await;

    for body in [
        json!({"code": "ZERO", "discountPercentage": 0.0}),
        json!({"code": "TOO-MUCH", "discountPercentage": 120.0}),
        json!({"code": "", "discountPercentage": 10.0}),
        json!({"code": "HAS SPACE", "discountPercentage": 10.0}),
    ] {
        let response = send(
            &app,
            json_request("POST", "/api/admin/discount-codes", Some(&cookie), body.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn test_discount_usage_report_filters() {
    let (app, state) = common::create_test_app();
    let cookie = admin_login(&app).await;

    let spring = state.db.create_discount_code("SPRING", 10.0, None, None).unwrap();
    let autumn = state
        .db
        .create_discount_code("AUTUMN", 20.0, Some("Newsletter".to_string()), None)
        .unwrap();

    let usages = [
        (spring.id, Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()),
        (autumn.id, Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()),
        (autumn.id, Utc.with_ymd_and_hms(2026, 9, 30, 23, 0, 0).unwrap()),
    ];
    for (n, (code_id, used_at)) in usages.into_iter().enumerate() {
        state.db.record_discount_usage(DiscountUsage {
            id: 0,
            discount_code_id: code_id,
            payment_id: n as u64 + 1,
            user_id: None,
            original_amount: 129.0,
            discount_amount: 12.9,
            final_amount: 116.1,
            used_at,
        });
    }

    let all = json_body(
        send(
            &app,
            empty_request("GET", "/api/admin/discount-usage", Some(&cookie)),
        )
        .await,
    )
    .await;
    assert_eq!(all.as_array().unwrap().len(), 3);
    // Newest first
    assert_eq!(all[0]["code"], "AUTUMN");
    assert_eq!(all[2]["code"], "SPRING");

    let autumn_rows = json_body(
        send(
            &app,
            empty_request(
                "GET",
                "/api/admin/discount-usage?code=autumn",
                Some(&cookie),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(autumn_rows.as_array().unwrap().len(), 2);
    assert_eq!(autumn_rows[0]["description"], "Newsletter");

    // End date covers the whole day
    let september = json_body(
        send(
            &app,
            empty_request(
                "GET",
                "/api/admin/discount-usage?startDate=2026-09-01&endDate=2026-09-30",
                Some(&cookie),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(september.as_array().unwrap().len(), 2);

    let response = send(
        &app,
        empty_request(
            "GET",
            "/api/admin/discount-usage?startDate=yesterday",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customers_grouped_by_session() {
    let (app, _) = common::create_test_app();
    let admin = admin_login(&app).await;

    let (anon, _, _) = upload(&app, &[text_file("policy.txt", "terms")], &[], None).await;
    let anon = anon.unwrap();
    upload(
        &app,
        &[text_file("policy.txt", "terms"), text_file("quote.txt", "offer")],
        &[],
        Some(&anon),
    )
    .await;

    let user = register(&app, "known@example.com", None).await;
    upload(&app, &[text_file("policy.txt", "terms")], &[], Some(&user)).await;

    let customers = json_body(
        send(&app, empty_request("GET", "/api/admin/customers", Some(&admin))).await,
    )
    .await;
    let customers = customers.as_array().unwrap();
    assert_eq!(customers.len(), 2);

    assert_eq!(customers[0]["email"], "known@example.com");
    assert_eq!(customers[0]["analysesCount"], 1);

    assert!(customers[1]["email"]
        .as_str()
        .unwrap()
        .ends_with("@customer.assurly.io"));
    assert_eq!(customers[1]["analysesCount"], 2);
    assert_eq!(customers[1]["policiesUploaded"], 3);
}

#[tokio::test]
async fn test_campaign_reports_sent_count() {
    let (app, _, upstream) = common::create_integrated_app().await;
    let cookie = admin_login(&app).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/send-campaign",
            Some(&cookie),
            json!({
                "subject": "Nye priser",
                "content": "Spar <b>20%</b>\npå din bilforsikring",
                "recipients": ["a@example.com", "b@example.com"],
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sentCount"], 2);
    assert_eq!(body["failedCount"], 0);

    let emails = upstream.emails();
    assert_eq!(emails.len(), 2);
    assert_eq!(emails[1]["personalizations"][0]["to"][0]["email"], "b@example.com");
    assert_eq!(
        emails[0]["content"][1]["value"],
        "Spar &lt;b&gt;20%&lt;/b&gt;<br>på din bilforsikring"
    );
}

#[tokio::test]
async fn test_campaign_without_mailer_counts_failures() {
    let (app, _) = common::create_test_app();
    let cookie = admin_login(&app).await;

    let body = json_body(
        send(
            &app,
            json_request(
                "POST",
                "/api/admin/send-campaign",
                Some(&cookie),
                json!({"subject": "Hi", "content": "Hello", "recipients": ["a@example.com"]}),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(body["sentCount"], 0);
    assert_eq!(body["failedCount"], 1);
}

#[tokio::test]
async fn test_campaign_validates_recipients() {
    let (app, _) = common::create_test_app();
    let cookie = admin_login(&app).await;

    for recipients in [json!([]), json!(["fine@example.com", "not-an-address"])] {
        let response = send(
            &app,
            json_request(
                "POST",
                "/api/admin/send-campaign",
                Some(&cookie),
                json!({"subject": "Hi", "content": "Hello", "recipients": recipients}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_password_reset_flow() {
    let (app, state, upstream) = common::create_integrated_app().await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/reset-password",
            None,
            json!({"email": ADMIN_EMAIL}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let known = json_body(response).await;

    // Unknown addresses get the same answer
    let unknown = json_body(
        send(
            &app,
            json_request(
                "POST",
                "/api/admin/reset-password",
                None,
                json!({"email": "stranger@example.com"}),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(known, unknown);

    let token = state
        .db
        .get_admin_user_by_email(ADMIN_EMAIL)
        .unwrap()
        .reset_token
        .unwrap();
    let emails = upstream.emails();
    assert_eq!(emails.len(), 1);
    assert!(emails[0]["content"][0]["value"]
        .as_str()
        .unwrap()
        .contains(&token));

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/update-password",
            None,
            json!({"token": "wrong-token", "password": "brand-new-password"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/update-password",
            None,
            json!({"token": token, "password": "brand-new-password"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The token is single use
    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/update-password",
            None,
            json!({"token": token, "password": "another-password"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/admin/login",
            None,
            json!({"email": ADMIN_EMAIL, "password": "brand-new-password"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_insurance_data_reports() {
    let (app, state) = common::create_test_app();
    let cookie = admin_login(&app).await;

    for (postcode, insurance_type, premium) in [
        ("2100", "bil", Some(4000.0)),
        ("2100", "hus", Some(6000.0)),
        ("8000", "bil", Some(5000.0)),
        ("8000", "bil", None),
    ] {
        state.db.create_insurance_data(InsuranceData {
            id: 0,
            postcode: postcode.to_string(),
            insurance_type: insurance_type.to_string(),
            coverage_level: None,
            annual_premium: premium,
            insurance_company: None,
            product_name: None,
            extracted_data: None,
            collected_at: Utc::now(),
            data_source: "upload".to_string(),
        });
    }

    let stats = json_body(
        send(
            &app,
            empty_request(
                "GET",
                "/api/admin/insurance-data/stats?insuranceType=bil",
                Some(&cookie),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(stats["sampleSize"], 2);
    assert_eq!(stats["averagePremium"], 4500.0);
    assert_eq!(stats["priceRange"], json!({"min": 4000.0, "max": 5000.0}));

    let stats = json_body(
        send(
            &app,
            empty_request(
                "GET",
                "/api/admin/insurance-data/stats?postcode=2100&insuranceType=hus",
                Some(&cookie),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(stats["sampleSize"], 1);

    let rows = json_body(
        send(
            &app,
            empty_request(
                "GET",
                "/api/admin/insurance-data/by-postcode/8000",
                Some(&cookie),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(rows.as_array().unwrap().len(), 2);

    let rows = json_body(
        send(
            &app,
            empty_request("GET", "/api/admin/insurance-data/by-type/hus", Some(&cookie)),
        )
        .await,
    )
    .await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["postcode"], "2100");
}

#[tokio::test]
async fn test_cleanup_removes_expired_records() {
    let (app, state) = common::create_test_app();
    let cookie = admin_login(&app).await;

    // Paid upload: kept for 30 days
    let (_, status, body) = upload(
        &app,
        &[text_file("policy.txt", "terms")],
        &[("analysisType", "single")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fresh_id = body["analysisId"].as_u64().unwrap();

    let past = Utc::now() - Duration::days(1);
    let stale = state.db.create_document(Document {
        id: 0,
        user_id: None,
        session_id: "old-session".to_string(),
        filename: "1-old.txt".to_string(),
        original_name: "old.txt".to_string(),
        file_size: 3,
        mime_type: "text/plain".to_string(),
        document_type: DocumentType::CurrentPolicy,
        extracted_text: "old".to_string(),
        uploaded_at: past - Duration::days(30),
        expires_at: Some(past),
        analysis_status: AnalysisStatus::Completed,
    });
    let stale_analysis = state
        .db
        .create_analysis(assurly::models::Analysis {
            id: 0,
            user_id: None,
            session_id: "old-session".to_string(),
            document_ids: vec![stale.id],
            analysis_type: Tier::Single,
            analysis_data: None,
            comparison_data: None,
            status: AnalysisStatus::Completed,
            created_at: past - Duration::days(30),
            expires_at: Some(past),
        });

    let response = send(&app, empty_request("POST", "/api/admin/cleanup", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["documentsDeleted"], 1);
    assert_eq!(body["analysesDeleted"], 1);

    assert!(state.db.get_document(stale.id).is_none());
    assert!(state.db.get_analysis(stale_analysis.id).is_none());
    assert!(state.db.get_analysis(fresh_id).is_some());
}
