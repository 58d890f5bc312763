pub mod use_children;
pub mod use_role_gate;
