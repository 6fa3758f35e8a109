// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Gateprobe Library
 * Concurrent VPN gateway credential auditing engine
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

pub mod config;
pub mod engine;
pub mod errors;
pub mod output;
pub mod probes;
pub mod source;
pub mod stats;
pub mod tracker;
pub mod types;
