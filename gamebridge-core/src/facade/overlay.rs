//! `facade.overlay()`: requests to the out-of-process platform overlay.
//!
//! Everything here is fire-and-forget. A successful return means the request
//! was forwarded; what the overlay did with it is reported through
//! `NavigationRequested` / `OverlayActivated` events on later pumps.

use gamebridge_native::{Dialog, OverlayMode, StoreFlag};

use crate::error::BindingError;
use crate::facade::Facade;

pub struct Overlay<'a> {
    facade: &'a Facade,
}

impl<'a> Overlay<'a> {
    pub(crate) fn new(facade: &'a Facade) -> Self {
        Self { facade }
    }

    /// Open `url` in the overlay browser.
    pub fn activate_to_web_page(&self, url: &str) -> Result<(), BindingError> {
        self.activate_to_web_page_with_mode(url, OverlayMode::Default)
    }

    /// Open `url` in the overlay browser.
    ///
    /// Fails with `InvalidArgument` for anything but an absolute http(s) URL
    /// (native code is not called), and with `NavigationRejected` if the
    /// overlay refuses the request outright.
    pub fn activate_to_web_page_with_mode(&self, url: &str, mode: OverlayMode) -> Result<(), BindingError> {
        self.facade.handle()?;
        validate_web_url(url)?;

        let accepted = self
            .facade
            .call(|native, raw| native.activate_overlay_to_web_page(raw, url, mode))?;
        if !accepted {
            tracing::warn!("overlay refused navigation to {url}");
            return Err(BindingError::NavigationRejected { url: url.to_string() });
        }
        tracing::debug!("overlay navigation to {url} forwarded ({mode:?})");
        Ok(())
    }

    pub fn activate_dialog(&self, dialog: Dialog) -> Result<(), BindingError> {
        self.facade
            .call(|native, raw| native.activate_overlay(raw, dialog))
    }

    /// Open the store page of `app_id`.
    pub fn activate_to_store(&self, app_id: u32, flag: StoreFlag) -> Result<(), BindingError> {
        self.facade.handle()?;
        if app_id == 0 {
            return Err(BindingError::InvalidArgument("store app id is 0".to_string()));
        }
        self.facade
            .call(|native, raw| native.activate_overlay_to_store(raw, app_id, flag))
    }
}

fn validate_web_url(url: &str) -> Result<(), BindingError> {
    match url::Url::parse(url) {
        Ok(u) if (u.scheme() == "http" || u.scheme() == "https") && u.has_host() => Ok(()),
        Ok(u) => Err(BindingError::InvalidArgument(format!(
            "unsupported URL scheme {:?} in {url:?}",
            u.scheme()
        ))),
        Err(e) => Err(BindingError::InvalidArgument(format!("invalid URL {url:?}: {e}"))),
    }
}
