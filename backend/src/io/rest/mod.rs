//! # REST API Interface Layer
//!
//! HTTP endpoints of the LMS proxy. Handlers translate between the browser
//! client and the external backend; they hold no business rules of their own.

pub mod guardian_student_apis;
