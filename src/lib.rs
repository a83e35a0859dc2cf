//! # Waymark
//!
//! Bracket-code cross-referencing for a static personal website. Content
//! (photos, posts, points, lines, maps, notes, links, files, images) refers
//! to other content through bracket codes embedded in its text:
//!
//! ```text
//! Start at {{pointlink 1c0e5d1a-8b9f-4a57-9d8e-7a1f0b3c2d4e; text the trailhead;}}.
//! {{photo 7d2c4b6e-0f1a-4e3b-9c8d-5a6b7c8d9e0f; Dawn on the ridge}}
//! ```
//!
//! Waymark finds those codes, resolves them against the content store, and
//! rewrites them into HTML for the channel the text is going to, then
//! finds everything related to an item for its sidebar.
//!
//! # Architecture: Grammar → Resolvers → Channels
//!
//! ```text
//! 1. Grammar    text      →  tokens          (single-pass lexer)
//! 2. Resolve    token     →  record          (one table row per keyword)
//! 3. Dispatch   text      →  channel HTML    (fixed chain per channel)
//! 4. Related    record    →  sidebar block   (forward + backward references)
//! ```
//!
//! The same text renders differently per [`types::Channel`]:
//!
//! - **Site**: responsive figures, lazy-loaded interactive maps.
//! - **Email**: inline-styled single-size figures; maps stripped entirely,
//!   since email clients can't run the map scripts.
//! - **LocalDisplay**: like the site, but pictures load from the local media
//!   directory so the editor preview works before deployment.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`grammar`] | Bracket-code lexer and token queries (`has_spatial_tokens`, ...) |
//! | [`resolver`] | Table of keyword resolvers and special pages |
//! | [`dispatch`] | Per-channel resolver chains, render context, dangling-reference audit |
//! | [`related`] | Related-content discovery and the sidebar block |
//! | [`index`] | Generation-time reverse index with content-hash reuse |
//! | [`repository`] | `ContentRepository` trait and the per-call lookup cache |
//! | [`store`] | JSON-file content store |
//! | [`urls`] | `UrlBuilder` trait and the config-driven `SiteUrls` |
//! | [`markup`] | Maud fragment builders for links, figures, maps, sidebars |
//! | [`details`] | Link text, alt text, captions, camera details |
//! | [`picture`] | Picture size selection and `srcset` |
//! | [`config`] | `config.toml` loading, validation, merging |
//! | [`types`] | Content records and shared enums |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content Problems Are Not Errors
//!
//! A malformed or dangling bracket code renders as its raw text (or nothing,
//! for stripped map codes) and is reported on the progress channel. A
//! broken page is more useful to a single author than a failed generation
//! run. A repository that cannot be read, on the other hand, fails the call.
//!
//! ## Explicit Collaborators
//!
//! Resolvers never reach for global state. The repository, URL builder,
//! progress channel, cancellation token and options travel together in a
//! [`dispatch::RenderContext`], which also makes the per-call lookup cache a
//! one-line wrapper.
//!
//! ## Reverse Index Per Generation
//!
//! Finding backlinks live costs a full corpus scan per page. The generator
//! records reference edges once per generation ([`index`]) and pages read
//! them back while the generation version matches.

pub mod config;
pub mod details;
pub mod dispatch;
pub mod grammar;
pub mod index;
pub mod markup;
pub mod output;
pub mod picture;
pub mod related;
pub mod repository;
pub mod resolver;
pub mod store;
pub mod types;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_helpers;
