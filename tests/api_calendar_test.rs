//! Integration tests for the calendar API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_string, test_app};

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        (status, body_to_string(response.into_body()).await)
    }

    async fn create(app: &Router, user: &str, body: Value) -> Value {
        let (status, body) = send(app, request("POST", "/api/calendar/items", Some(user), Some(body))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        serde_json::from_str(&body).unwrap()
    }

    fn seminar() -> Value {
        json!({
            "title": "Seminar",
            "start": "2025-10-21T09:00:00Z",
            "end": "2025-10-21T10:00:00Z",
            "color": "blue",
            "location": "Room 4"
        })
    }

    /// Tests every calendar endpoint requires the user header
    #[tokio::test]
    #[serial]
    async fn it_returns_401_without_a_user() {
        let app = test_app().await;

        for (method, uri) in [
            ("GET", "/api/calendar/items"),
            ("GET", "/api/calendar/events"),
            ("DELETE", "/api/calendar/items/abc"),
        ] {
            let (status, _) = send(&app, request(method, uri, None, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    /// Tests creating, listing and deleting an item
    #[tokio::test]
    #[serial]
    async fn it_creates_lists_and_deletes_items() {
        let app = test_app().await;

        let created = create(&app, "u1", seminar()).await;
        assert_eq!(created["title"], "Seminar");
        assert_eq!(created["category"], "event");
        assert_eq!(created["created_by"], "u1");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, request("GET", "/api/calendar/items", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let items: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], id.as_str());

        let uri = format!("/api/calendar/items/{}", id);
        let (status, _) = send(&app, request("DELETE", &uri, Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Deleting again finds nothing
        let (status, _) = send(&app, request("DELETE", &uri, Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Tests one user can't see or change another user's items
    #[tokio::test]
    #[serial]
    async fn it_isolates_owners() {
        let app = test_app().await;
        let created = create(&app, "u1", seminar()).await;
        let id = created["id"].as_str().unwrap();

        let (_, body) = send(&app, request("GET", "/api/calendar/items", Some("u2"), None)).await;
        assert_eq!(body, "[]");

        let mut replace = seminar();
        replace["id"] = json!(id);
        replace["title"] = json!("Taken over");
        let (status, _) = send(
            &app,
            request("POST", "/api/calendar/items", Some("u2"), Some(replace)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/calendar/items/{}", id);
        let (status, _) = send(&app, request("DELETE", &uri, Some("u2"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, request("GET", "/api/calendar/items", Some("u1"), None)).await;
        let items: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(items[0]["title"], "Seminar");
    }

    /// Tests invalid payloads are rejected as bad requests
    #[tokio::test]
    #[serial]
    async fn it_rejects_invalid_items() {
        let app = test_app().await;

        let mut backwards = seminar();
        backwards["end"] = json!("2025-10-21T08:00:00Z");
        let (status, body) = send(
            &app,
            request("POST", "/api/calendar/items", Some("u1"), Some(backwards)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

        let mut untitled = seminar();
        untitled["title"] = json!("   ");
        let (status, _) = send(
            &app,
            request("POST", "/api/calendar/items", Some("u1"), Some(untitled)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Tests tasks are displayed at their due time and hidden colors
    /// are filtered out
    #[tokio::test]
    #[serial]
    async fn it_lists_display_events() {
        let app = test_app().await;
        create(&app, "u1", seminar()).await;
        create(
            &app,
            "u1",
            json!({
                "title": "Submit essay",
                "category": "task",
                "start": "2025-10-20T09:00:00Z",
                "end": "2025-10-24T17:00:00Z",
                "color": "orange"
            }),
        )
        .await;

        let (status, body) = send(&app, request("GET", "/api/calendar/events", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let events: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(events.len(), 2);
        let task = events.iter().find(|e| e["title"] == "Submit essay").unwrap();
        assert_eq!(task["start"], "2025-10-24T17:00:00Z");
        assert_eq!(task["end"], "2025-10-24T17:30:00Z");
        assert_eq!(task["label"], "Task");
        assert_eq!(task["reminder"], "2025-10-20T09:00:00Z");

        let (_, body) = send(
            &app,
            request("GET", "/api/calendar/events?hide=orange&hide=rose", Some("u1"), None),
        )
        .await;
        let events: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["title"], "Seminar");
    }

    /// Tests saving an item edited in the calendar
    #[tokio::test]
    #[serial]
    async fn it_saves_display_events() {
        let app = test_app().await;
        let created = create(&app, "u1", seminar()).await;

        let edited = json!({
            "id": created["id"],
            "title": "Seminar (moved)",
            "start": "2025-10-22T09:00:00Z",
            "end": "2025-10-22T11:00:00Z",
            "allDay": false,
            "color": "violet"
        });
        let (status, body) = send(&app, request("PUT", "/api/calendar/events", Some("u1"), Some(edited))).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let saved: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(saved["id"], created["id"]);
        assert_eq!(saved["color"], "violet");
        // Location is replaced along with the rest of the item
        assert!(saved.get("location").is_none());

        let (_, body) = send(&app, request("GET", "/api/calendar/items", Some("u1"), None)).await;
        let items: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["start"], "2025-10-22T09:00:00Z");
    }

    /// Tests the etiquette list covers the palette
    #[tokio::test]
    #[serial]
    async fn it_lists_etiquettes() {
        let app = test_app().await;
        let (status, body) = send(&app, request("GET", "/api/calendar/etiquettes", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        let etiquettes: Vec<Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(etiquettes.len(), 5);
        assert!(etiquettes.iter().all(|e| e["isActive"] == true));
    }
}
