//! Client-side data layer for the LMS dashboards: session state, the role
//! gate guard, the guardian children loader and the HTTP plumbing under them.

pub mod hooks;
pub mod services;

pub use hooks::use_children::{
    use_children, ChildrenFetch, ChildrenFetcher, ChildrenHandle, FetchError, MountState,
};
pub use hooks::use_role_gate::{use_role_gate, NavigationGuard};
pub use services::api::{ApiClient, ApiError, GuardianApi};
pub use services::notifications::{ErrorReporter, NotificationSink, Toast, ToastKind, ToastQueue};
pub use services::retry::RetryPolicy;
pub use services::session::SessionStore;
pub use services::storage::ClientStorage;
