// SPDX-License-Identifier: GPL-3.0-only

//! xdg-desktop-portal camera access
//!
//! Sandboxed processes ask `org.freedesktop.portal.Camera` for access; the
//! answer arrives as a `Response` signal on a request object whose path is
//! derived from our unique bus name and a handle token. Unsandboxed
//! processes open device nodes directly and need no grant.

use super::{PermissionProvider, PermissionState};
use crate::constants::app_info;
use crate::errors::{AppError, AppResult};
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Portal response codes
const RESPONSE_SUCCESS: u32 = 0;
const RESPONSE_CANCELLED: u32 = 1;

/// Camera permission through xdg-desktop-portal
#[derive(Debug, Clone, Default)]
pub struct PortalPermission;

impl PortalPermission {
    pub fn new() -> Self {
        Self
    }
}

/// Request object path for `token` on `connection`
///
/// `:1.42` becomes `1_42` per the portal convention.
fn request_path(unique_name: &str, token: &str) -> String {
    let sender = unique_name.trim_start_matches(':').replace('.', "_");
    format!("{}/request/{}/{}", PORTAL_PATH, sender, token)
}

fn map_response(code: u32) -> PermissionState {
    match code {
        RESPONSE_SUCCESS => PermissionState::Granted,
        RESPONSE_CANCELLED => PermissionState::NotDetermined,
        _ => PermissionState::Denied,
    }
}

async fn access_camera() -> Result<PermissionState, String> {
    let connection = zbus::Connection::session()
        .await
        .map_err(|e| format!("Failed to connect to session D-Bus: {}", e))?;

    let camera = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        PORTAL_PATH,
        CAMERA_INTERFACE,
    )
    .await
    .map_err(|e| format!("Failed to create camera portal proxy: {}", e))?;

    match camera.get_property::<bool>("IsCameraPresent").await {
        Ok(false) => warn!("Portal reports no camera present"),
        Ok(true) => {}
        Err(e) => debug!(error = %e, "IsCameraPresent unavailable"),
    }

    let unique_name = connection
        .unique_name()
        .map(|name| name.as_str().to_string())
        .ok_or_else(|| "Session bus connection has no unique name".to_string())?;
    let token = format!("meter_capture_{}", uuid::Uuid::new_v4().simple());
    let path = request_path(&unique_name, &token);

    // Subscribe before calling so a fast answer is not missed
    let request = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        path.as_str(),
        REQUEST_INTERFACE,
    )
    .await
    .map_err(|e| format!("Failed to create request proxy: {}", e))?;
    let mut responses = request
        .receive_signal("Response")
        .await
        .map_err(|e| format!("Failed to subscribe to portal response: {}", e))?;

    let mut options: HashMap<&str, Value<'_>> = HashMap::new();
    options.insert("handle_token", Value::from(token.as_str()));

    let handle: zbus::zvariant::OwnedObjectPath = camera
        .call("AccessCamera", &(options,))
        .await
        .map_err(|e| format!("AccessCamera failed: {}", e))?;
    if handle.as_str() != path {
        debug!(expected = %path, actual = %handle, "Portal returned a different request path");
    }

    let message = responses
        .next()
        .await
        .ok_or_else(|| "Portal closed before answering".to_string())?;
    let (code, _results): (u32, HashMap<String, OwnedValue>) = message
        .body()
        .deserialize()
        .map_err(|e| format!("Malformed portal response: {}", e))?;

    info!(code, "Camera portal answered");
    Ok(map_response(code))
}

impl PermissionProvider for PortalPermission {
    async fn check(&self) -> AppResult<PermissionState> {
        if app_info::is_flatpak() {
            // The portal keeps its own record and answers without a prompt
            // when access was granted before.
            Ok(PermissionState::NotDetermined)
        } else {
            debug!("Not sandboxed, camera nodes are accessible directly");
            Ok(PermissionState::Granted)
        }
    }

    async fn request(&self) -> AppResult<PermissionState> {
        if !app_info::is_flatpak() {
            return Ok(PermissionState::Granted);
        }
        access_camera().await.map_err(AppError::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_from_unique_name() {
        assert_eq!(
            request_path(":1.42", "tok"),
            "/org/freedesktop/portal/desktop/request/1_42/tok"
        );
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(map_response(0), PermissionState::Granted);
        assert_eq!(map_response(1), PermissionState::NotDetermined);
        assert_eq!(map_response(2), PermissionState::Denied);
    }
}
