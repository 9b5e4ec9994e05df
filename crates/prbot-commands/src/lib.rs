//! Shared helpers for the PR comment-command bot.
//! This crate provides the comment event model, the authorization gate, the
//! line classifier for the comment grammar, reply rendering, and GitHub
//! transport retry helpers consumed by the runtime crate.

pub mod comment_auth;
pub mod comment_event;
pub mod comment_line_parser;
pub mod comment_reply;
pub mod github_transport_helpers;
