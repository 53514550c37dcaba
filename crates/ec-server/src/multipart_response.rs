//! Builds multi-part responses for image-bearing reads (spec.md §6): a
//! `metadata` JSON part first, followed by the raw image bytes in order.
//! `axum::extract::Multipart` only parses *incoming* multipart bodies, so
//! there is no ready-made encoder on the way out; this assembles one
//! directly over `axum::body::Body`, the way `ec-server` is the one place
//! that owns the wire format in both directions.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;

const BOUNDARY: &str = "exam-coordinator-boundary";

pub struct ImagePart {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub struct MultipartImageResponse {
    pub metadata_json: Vec<u8>,
    pub images: Vec<ImagePart>,
}

impl IntoResponse for MultipartImageResponse {
    fn into_response(self) -> Response<Body> {
        let mut body = Vec::new();

        write_part(&mut body, "metadata", "application/json", &self.metadata_json);
        for image in &self.images {
            write_part(&mut body, &image.name, "application/octet-stream", &image.bytes);
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let content_type = format!("multipart/mixed; boundary={BOUNDARY}");
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = StatusCode::OK;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&content_type).expect("boundary is ASCII"),
        );
        response
    }
}

fn write_part(body: &mut Vec<u8>, name: &str, content_type: &str, bytes: &[u8]) {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}
