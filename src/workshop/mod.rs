// SPDX-License-Identifier: GPL-3.0-only
pub mod client;
pub mod error;
pub mod models;
pub mod sync;
pub mod upload;

pub use client::WorkshopClient;
pub use models::{ClientOptions, UploadRequest};
