#![allow(dead_code)]

//! Mock batch-management backend for integration tests.
//!
//! Runs on an ephemeral port and answers the endpoints the pipeline uses.
//! Emails in `taken_emails` are flagged by validation; emails in
//! `reserved_emails` pass validation but are refused at creation time, as if
//! another admin had registered them in between.

use actix_multipart::Multipart;
use actix_web::dev::ServerHandle;
use actix_web::web::{self, delete, get, post, put, scope};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Scope};
use common::model::batch::Batch;
use common::model::id::Id;
use common::requests::{CreateBatchRequest, UpdateBatchRequest};
use futures_util::StreamExt;
use serde_json::json;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uploader::api::ApiClient;
use uploader::session::Session;

#[derive(Default)]
pub struct MockState {
    pub taken_emails: Mutex<HashSet<String>>,
    pub reserved_emails: Mutex<HashSet<String>>,
    pub batches: Mutex<Vec<Batch>>,
    pub fail_creation: AtomicBool,
    /// Batch names refused with a 200 and `success: false`.
    pub taken_names: Mutex<HashSet<String>>,
    pub create_requests: Mutex<Vec<CreateBatchRequest>>,
    pub validated_campus_ids: Mutex<Vec<String>>,
    pub authorization: Mutex<Option<String>>,
}

impl MockState {
    pub fn with_taken(emails: &[&str]) -> Self {
        let state = MockState::default();
        state
            .taken_emails
            .lock()
            .unwrap()
            .extend(emails.iter().map(|e| e.to_string()));
        state
    }

    pub fn with_reserved(emails: &[&str]) -> Self {
        let state = MockState::default();
        state
            .reserved_emails
            .lock()
            .unwrap()
            .extend(emails.iter().map(|e| e.to_string()));
        state
    }

    pub fn seed_batch(&self, id: &str, name: &str, student_count: u32) {
        self.batches.lock().unwrap().push(Batch {
            id: Id::from(id),
            name: name.to_string(),
            campus_ids: BTreeSet::from([Id::from("c1")]),
            course_ids: BTreeSet::from([Id::from("k1")]),
            student_count,
        });
    }
}

pub struct MockBackend {
    pub state: web::Data<MockState>,
    pub base_url: String,
    handle: ServerHandle,
}

impl MockBackend {
    pub fn client(&self) -> ApiClient {
        client_for(&self.base_url, None)
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

pub fn client_for(base_url: &str, token: Option<&str>) -> ApiClient {
    let session = Session::new(base_url, token.map(str::to_string)).expect("session");
    ApiClient::new(&session).expect("api client")
}

/// Base URL of a port nothing listens on.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind scratch port");
    let addr = listener.local_addr().expect("scratch port addr");
    drop(listener);
    format!("http://{}", addr)
}

pub async fn start_backend(state: MockState) -> MockBackend {
    let data = web::Data::new(state);
    let app_data = data.clone();
    let server = HttpServer::new(move || App::new().app_data(app_data.clone()).service(routes()))
        .workers(1)
        .shutdown_timeout(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock backend");
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    MockBackend {
        state: data,
        base_url: format!("http://{}", addr),
        handle,
    }
}

fn routes() -> Scope {
    scope("/batch-management")
        .route("/", get().to(list_batches))
        .route("/campuses", get().to(list_campuses))
        .route("/courses", get().to(list_courses))
        .route("/validate-student-upload", post().to(validate_upload))
        .route("/create-with-students", post().to(create_with_students))
        .route("/{id}", put().to(update_batch))
        .route("/{id}", delete().to(delete_batch))
}

async fn list_batches(state: web::Data<MockState>) -> HttpResponse {
    let batches = state.batches.lock().unwrap().clone();
    HttpResponse::Ok().json(json!({ "success": true, "data": batches }))
}

async fn list_campuses() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "data": [{ "_id": "c1", "name": "North" }, { "_id": "c2", "name": "South" }]
    }))
}

async fn list_courses(query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let wanted: Vec<String> = query
        .get("campus_ids")
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let courses: Vec<_> = [("k1", "GRE", "c1"), ("k2", "GMAT", "c1"), ("k3", "IELTS", "c2")]
        .into_iter()
        .filter(|(_, _, campus)| wanted.iter().any(|w| w == campus))
        .map(|(id, name, campus)| json!({ "id": id, "name": name, "campus_id": campus }))
        .collect();
    HttpResponse::Ok().json(json!({ "success": true, "data": { "data": courses } }))
}

async fn validate_upload(
    req: HttpRequest,
    state: web::Data<MockState>,
    mut payload: Multipart,
) -> HttpResponse {
    record_authorization(&req, &state);
    let mut file: Vec<u8> = Vec::new();
    let mut campus_id: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
        };
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
            }
        }
        match name.as_deref() {
            Some("file") => file = bytes,
            Some("campus_id") => campus_id = Some(String::from_utf8_lossy(&bytes).into_owned()),
            _ => {}
        }
    }

    let Some(campus_id) = campus_id else {
        return HttpResponse::BadRequest().json(json!({ "success": false, "message": "campus_id is required" }));
    };
    state.validated_campus_ids.lock().unwrap().push(campus_id);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(file.as_slice());
    let taken = state.taken_emails.lock().unwrap().clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
        };
        let cell = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        let email = cell(4);
        let mut errors: Vec<&str> = Vec::new();
        if (2..=4).any(|i| cell(i).is_empty()) {
            errors.push("Missing required fields");
        }
        if taken.contains(&email) {
            errors.push("Email already exists");
        }
        rows.push(json!({
            "campus_name": cell(0),
            "course_name": cell(1),
            "student_name": cell(2),
            "roll_number": cell(3),
            "email": email,
            "mobile_number": cell(5),
            "errors": errors,
        }));
    }
    HttpResponse::Ok().json(json!({ "success": true, "data": { "data": rows } }))
}

async fn create_with_students(
    req: HttpRequest,
    state: web::Data<MockState>,
    body: web::Json<CreateBatchRequest>,
) -> HttpResponse {
    record_authorization(&req, &state);
    let request = body.into_inner();
    state.create_requests.lock().unwrap().push(request.clone());
    if state.fail_creation.load(Ordering::SeqCst) {
        return HttpResponse::ServiceUnavailable().body("Service Unavailable");
    }

    if state.taken_names.lock().unwrap().contains(&request.name) {
        return HttpResponse::Ok().json(json!({
            "success": false,
            "message": "Batch name already exists",
        }));
    }

    let mut reserved = state.reserved_emails.lock().unwrap();
    let mut created = Vec::new();
    let mut errors = Vec::new();
    for (idx, student) in request.students.iter().enumerate() {
        if reserved.contains(&student.email) {
            errors.push(json!({
                "row": student.row.unwrap_or(idx + 2),
                "email": student.email,
                "error": "Email already exists",
            }));
            continue;
        }
        reserved.insert(student.email.clone());
        created.push(json!({
            "student_name": student.student_name,
            "username": student.roll_number.to_lowercase(),
            "password": format!("Pw-{}", student.roll_number),
            "email": student.email,
        }));
    }

    if created.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "No students could be created",
            "errors": errors,
        }));
    }

    let mut batches = state.batches.lock().unwrap();
    let batch = Batch {
        id: Id::new(format!("b{}", batches.len() + 1)),
        name: request.name.clone(),
        campus_ids: request.campus_ids.iter().cloned().collect(),
        course_ids: request.course_ids.iter().cloned().collect(),
        student_count: created.len() as u32,
    };
    batches.push(batch.clone());

    if errors.is_empty() {
        HttpResponse::Created().json(json!({
            "success": true,
            "message": "Batch created successfully",
            "data": { "created_students": created, "batch": batch },
        }))
    } else {
        HttpResponse::MultiStatus().json(json!({
            "success": true,
            "message": "Batch created with some errors",
            "data": { "created_students": created, "errors": errors, "batch": batch },
        }))
    }
}

async fn update_batch(
    state: web::Data<MockState>,
    path: web::Path<String>,
    body: web::Json<UpdateBatchRequest>,
) -> HttpResponse {
    let id = Id::new(path.into_inner());
    let mut batches = state.batches.lock().unwrap();
    match batches.iter_mut().find(|b| b.id == id) {
        Some(batch) => {
            if let Some(name) = &body.name {
                batch.name = name.clone();
            }
            HttpResponse::Ok().json(json!({ "success": true, "data": batch }))
        }
        None => HttpResponse::NotFound().json(json!({ "success": false, "message": "Batch not found" })),
    }
}

async fn delete_batch(state: web::Data<MockState>, path: web::Path<String>) -> HttpResponse {
    let id = Id::new(path.into_inner());
    let mut batches = state.batches.lock().unwrap();
    let before = batches.len();
    batches.retain(|b| b.id != id);
    if batches.len() == before {
        HttpResponse::NotFound().json(json!({ "success": false, "message": "Batch not found" }))
    } else {
        HttpResponse::Ok().json(json!({ "success": true, "message": "Batch deleted" }))
    }
}

fn record_authorization(req: &HttpRequest, state: &MockState) {
    let value = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.authorization.lock().unwrap() = value;
}
