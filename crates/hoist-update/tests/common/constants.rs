//! Shared constants for test infrastructure

// Versions
pub const VERSION_1_0_0: &str = "1.0.0";
pub const VERSION_1_2_3: &str = "1.2.3";
pub const VERSION_1_3_0: &str = "1.3.0";
pub const VERSION_2_0_0: &str = "2.0.0";

// Tags as published
pub const TAG_V1_2_3: &str = "v1.2.3";
pub const TAG_V1_3_0: &str = "v1.3.0";
pub const TAG_V1_3_0_RC1: &str = "v1.3.0-rc.1";
pub const TAG_V2_0_0: &str = "v2.0.0";
pub const TAG_V2_0_0_BETA: &str = "v2.0.0-beta";

// Feed
pub const TEST_OWNER: &str = "acme";
pub const TEST_REPO: &str = "widget";
pub const ASSET_BASE_URL: &str = "https://downloads.example.com";

// Asset names
pub const ASSET_TARBALL: &str = "widget-linux-x86_64.tar.gz";
pub const ASSET_ZIP: &str = "widget-windows-x86_64.zip";

// Installed payloads
pub const OLD_BINARY: &[u8] = b"#!/bin/sh\necho widget 1.0.0\n";
pub const NEW_BINARY: &[u8] = b"#!/bin/sh\necho widget 2.0.0\n";
pub const OLD_CONFIG: &[u8] = b"mode: legacy\n";
pub const NEW_CONFIG: &[u8] = b"mode: modern\n";

// Signing key seeds
pub const TRUSTED_SEED: u8 = 7;
pub const ROGUE_SEED: u8 = 42;
pub const TRUSTED_KEY_NAME: &str = "release-2026";
