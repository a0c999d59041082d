//! End-to-end flows against a live Postgres. Run with
//! `DATABASE_URL=... cargo test -- --ignored`.

use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use training_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    middleware::auth::Role,
    routes,
    utils::token::TokenIssuer,
    AppState,
};

const SECRET: &str = "flow_test_secret";

async fn app() -> Router {
    dotenvy::dotenv().ok();
    let config = Config {
        server_address: "127.0.0.1:0".into(),
        database_url: env::var("DATABASE_URL").expect("DATABASE_URL"),
        jwt_secret: SECRET.into(),
        token_ttl_days: 1,
        login_rps: 1000,
        mail_relay_url: None,
        mail_relay_token: None,
        mail_from: "office@college.edu".into(),
        mail_batch_size: 80,
        log_json: false,
        cors_origins: Vec::new(),
    };
    let pool = create_pool(&config).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    routes::router(AppState::new(pool, config).expect("state"))
}

fn admin() -> String {
    let issued = TokenIssuer::new(SECRET, 1)
        .issue(Uuid::new_v4(), Role::Admin)
        .expect("token");
    format!("Bearer {}", issued.token)
}

fn bearer_for(id: &str, role: Role) -> String {
    let id = Uuid::parse_str(id).expect("uuid");
    let issued = TokenIssuer::new(SECRET, 1).issue(id, role).expect("token");
    format!("Bearer {}", issued.token)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    call_as(app, &admin(), method, uri, body).await
}

async fn call_as(
    app: &Router,
    token: &str,
    method: &str,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, token);
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn upload_csv(app: &Router, module_id: &str, exam: i32, csv: &str) -> (StatusCode, JsonValue) {
    let boundary = "flowtestboundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"moduleId\"\r\n\r\n{m}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"examIndex\"\r\n\r\n{e}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"marks.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        m = module_id,
        e = exam,
        c = csv
    );
    let req = Request::builder()
        .method("POST")
        .uri("/admin/upload-scores")
        .header(header::AUTHORIZATION, admin())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

struct Cohort {
    module_id: String,
    venue_id: String,
    asha: (String, String),
    ravi: (String, String),
}

async fn enrolled_cohort(app: &Router) -> Cohort {
    let tag = Uuid::new_v4().simple().to_string();
    let mut students = Vec::new();
    for name in ["Asha", "Ravi"] {
        let reg_no = format!("{}-{}", name.to_uppercase(), &tag[..8]);
        let (status, body) = call(
            app,
            "POST",
            "/admin/students",
            Some(json!({
                "name": name,
                "regNo": reg_no,
                "email": format!("{}.{}@college.edu", name.to_lowercase(), &tag[..8]),
                "password": "secret123",
                "batch": "Dream",
                "passoutYear": 2025,
                "department": "CSE"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        students.push((body["id"].as_str().unwrap().to_string(), reg_no));
    }

    let (status, module) = call(
        app,
        "POST",
        "/admin/modules",
        Some(json!({ "title": format!("Aptitude {}", tag), "durationDays": 5, "examsCount": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", module);
    let module_id = module["id"].as_str().unwrap().to_string();

    let (status, venue) = call(
        app,
        "POST",
        "/admin/venues",
        Some(json!({ "name": format!("Hall {}", tag), "capacity": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", venue);
    let venue_id = venue["id"].as_str().unwrap().to_string();

    let (status, assigned) = call(
        app,
        "POST",
        "/admin/assign-module",
        Some(json!({
            "moduleId": module_id,
            "venues": [{ "venueId": venue_id, "studentIds": [students[0].0, students[1].0] }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", assigned);
    assert_eq!(assigned["created"], 2);

    let ravi = students.pop().unwrap();
    let asha = students.pop().unwrap();
    Cohort {
        module_id,
        venue_id,
        asha,
        ravi,
    }
}

#[tokio::test]
#[ignore]
async fn omitted_students_are_notified_once() {
    let app = app().await;
    let cohort = enrolled_cohort(&app).await;
    let batch = json!({
        "date": "2024-07-01",
        "session": "forenoon",
        "attendanceData": [
            { "studentId": cohort.asha.0, "venueId": cohort.venue_id, "present": true }
        ]
    });

    let (status, first) = call(&app, "POST", "/admin/mark-attendance", Some(batch.clone())).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["summary"]["updated"], 2);
    assert_eq!(first["summary"]["absenceNotifications"], 1);
    let omitted: Vec<&JsonValue> = first["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["byOmission"] == true)
        .collect();
    assert_eq!(omitted.len(), 1);
    assert_eq!(omitted[0]["studentId"], cohort.ravi.0.as_str());

    let (status, second) = call(&app, "POST", "/admin/mark-attendance", Some(batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["summary"]["absenceNotifications"], 0);

    let uri = format!(
        "/admin/modules/{}/leaderboard",
        cohort.module_id
    );
    let (_, board) = call(&app, "GET", &uri, None).await;
    for entry in board["leaderboard"].as_array().unwrap() {
        assert_eq!(entry["attendance"]["total"], 1);
    }
}

#[tokio::test]
#[ignore]
async fn bulk_marks_are_doubled_and_ranked() {
    let app = app().await;
    let cohort = enrolled_cohort(&app).await;

    let (status, single) = call(
        &app,
        "POST",
        "/admin/upload-score",
        Some(json!({
            "studentId": cohort.asha.0,
            "moduleId": cohort.module_id,
            "examIndex": "1",
            "score": 40
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", single);
    assert_eq!(single["score"], 40.0);
    assert_eq!(single["averageScore"], 20.0);

    let csv = format!("Reg No,Name,Mark\n{},Ravi,30\nNOPE-000,Ghost,10\n", cohort.ravi.1);
    let (status, bulk) = upload_csv(&app, &cohort.module_id, 1, &csv).await;
    assert_eq!(status, StatusCode::OK, "{}", bulk);
    assert_eq!(bulk["succeeded"], 1);
    assert_eq!(bulk["failed"], 1);
    assert_eq!(bulk["results"][0]["storedScore"], 60.0);

    let uri = format!("/admin/modules/{}/leaderboard", cohort.module_id);
    let (_, board) = call(&app, "GET", &uri, None).await;
    let ranked: Vec<(i64, &str)> = board["leaderboard"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| (e["rank"].as_i64().unwrap(), e["student"]["name"].as_str().unwrap()))
        .collect();
    assert_eq!(ranked, vec![(1, "Ravi"), (2, "Asha")]);
}

#[tokio::test]
#[ignore]
async fn deleting_a_student_removes_their_progress() {
    let app = app().await;
    let cohort = enrolled_cohort(&app).await;

    let (status, deleted) = call(&app, "DELETE", &format!("/admin/students/{}", cohort.asha.0), None).await;
    assert_eq!(status, StatusCode::OK, "{}", deleted);
    assert_eq!(deleted["progressRecordsDeleted"], 1);

    let (status, _) = call(&app, "GET", &format!("/admin/students/{}", cohort.asha.0), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/admin/modules/{}/leaderboard", cohort.module_id);
    let (_, board) = call(&app, "GET", &uri, None).await;
    assert_eq!(board["leaderboard"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn module_completion_is_once_only() {
    let app = app().await;
    let cohort = enrolled_cohort(&app).await;
    let uri = format!("/admin/modules/{}/complete", cohort.module_id);

    let (status, done) = call(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{}", done);
    assert_eq!(done["studentsCredited"], 2);

    let (status, _) = call(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn a_venue_takes_one_staff_member() {
    let app = app().await;
    let tag = Uuid::new_v4().simple().to_string();

    let mut staff_ids = Vec::new();
    for who in ["lead", "backup"] {
        let (status, staff) = call(
            &app,
            "POST",
            "/admin/staff",
            Some(json!({
                "name": who,
                "email": format!("{}.{}@college.edu", who, &tag[..8]),
                "password": "secret123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", staff);
        staff_ids.push(staff["id"].as_str().unwrap().to_string());
    }
    let (_, venue) = call(
        &app,
        "POST",
        "/admin/venues",
        Some(json!({ "name": format!("Lab {}", tag), "capacity": 30 })),
    )
    .await;
    let venue_id = venue["id"].as_str().unwrap().to_string();

    let (status, assigned) = call(
        &app,
        "POST",
        "/admin/assign-staff",
        Some(json!({ "staffId": staff_ids[0], "venueId": venue_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", assigned);

    let (status, _) = call(
        &app,
        "POST",
        "/admin/assign-staff",
        Some(json!({ "staffId": staff_ids[1], "venueId": venue_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "POST",
        "/admin/unassign-staff",
        Some(json!({ "staffId": staff_ids[0] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "POST",
        "/admin/unassign-staff",
        Some(json!({ "staffId": staff_ids[0] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn staff_marks_touch_only_listed_students() {
    let app = app().await;
    let cohort = enrolled_cohort(&app).await;
    let tag = Uuid::new_v4().simple().to_string();

    let (status, staff) = call(
        &app,
        "POST",
        "/admin/staff",
        Some(json!({
            "name": "Venue lead",
            "email": format!("lead.{}@college.edu", &tag[..8]),
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", staff);
    let staff_id = staff["id"].as_str().unwrap().to_string();
    let (status, _) = call(
        &app,
        "POST",
        "/admin/assign-staff",
        Some(json!({ "staffId": staff_id, "venueId": cohort.venue_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = bearer_for(&staff_id, Role::Staff);
    let (status, marked) = call_as(
        &app,
        &token,
        "POST",
        "/staff/mark-attendance",
        Some(json!({
            "date": "2024-07-02",
            "session": "afternoon",
            "attendanceData": [{ "studentId": cohort.asha.0, "present": true }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", marked);
    assert_eq!(marked["summary"]["total"], 1);
    assert_eq!(marked["summary"]["updated"], 1);
    assert_eq!(marked["summary"]["absenceNotifications"], 0);

    let uri = format!("/student/{}/module/{}", cohort.ravi.0, cohort.module_id);
    let (status, untouched) = call(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{}", untouched);
    assert!(untouched["attendance"].as_array().unwrap().is_empty());

    let uri = format!(
        "/admin/existing-attendance?date=2024-07-02&session=afternoon&venueId={}",
        cohort.venue_id
    );
    let (status, existing) = call(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{}", existing);
    let records = existing["records"].as_object().unwrap();
    assert_eq!(records.len(), 1);
    let asha = &records[cohort.asha.0.as_str()];
    assert_eq!(asha["present"], true);
    assert_eq!(asha["onDuty"], false);
    assert_eq!(asha["venueId"], cohort.venue_id.as_str());

    let (status, absent) = call_as(
        &app,
        &token,
        "POST",
        "/staff/mark-attendance",
        Some(json!({
            "date": "2024-07-02",
            "session": "afternoon",
            "attendanceData": [{ "studentId": cohort.ravi.0, "present": false }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", absent);
    assert_eq!(absent["summary"]["absenceNotifications"], 0);

    let (_, existing) = call(&app, "GET", &uri, None).await;
    assert_eq!(existing["records"].as_object().unwrap().len(), 2);
    assert_eq!(existing["records"][cohort.asha.0.as_str()]["present"], true);
}
