// SPDX-License-Identifier: CEPL-1.0
//! Window-system collaborator: one window, polled without blocking.
//!
//! The render loop owns the cadence, so instead of handing control to
//! `EventLoop::run_app` this crate pumps the winit event queue once per
//! frame through [`EventLoopExtPumpEvents`].
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "android",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
)))]
compile_error!("nirvana-platform: no windowing backend with pollable events for this target");

pub use winit;

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window, WindowAttributes, WindowId},
};

// Upper bound on pumps spent waiting for the platform to hand us a live window.
const MAX_CREATE_PUMPS: u32 = 256;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("event loop: {0}")]
    EventLoop(#[from] EventLoopError),

    #[error("window creation failed: {0}")]
    CreateWindow(#[from] OsError),

    /// Caller asked for the window before `create_window` succeeded.
    #[error("window has not been created yet")]
    NotInitialized,

    #[error("event loop exited with code {0} before the window appeared")]
    ExitedEarly(i32),

    #[error(transparent)]
    BadHandle(#[from] HandleError),
}

#[derive(Default)]
struct WindowState {
    pending: Option<WindowAttributes>,
    window: Option<Window>,
    create_error: Option<OsError>,
    close_requested: bool,
}

impl WindowState {
    fn create_pending(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Some(attrs) = self.pending.take() {
            match event_loop.create_window(attrs) {
                Ok(window) => {
                    let size = window.inner_size();
                    info!("window created ({}x{})", size.width, size.height);
                    self.window = Some(window);
                }
                Err(e) => self.create_error = Some(e),
            }
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.create_pending(event_loop);
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match &self.window {
            Some(window) if window.id() == id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Destroyed => {
                debug!("window destroyed by the platform");
                self.close_requested = true;
            }
            _ => {}
        }
    }
}

pub struct Platform {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl Platform {
    pub fn init() -> Result<Self, PlatformError> {
        let event_loop = EventLoop::new()?;
        Ok(Self {
            event_loop,
            state: WindowState::default(),
        })
    }

    /// Creates the (single, fixed-size) window and pumps until the platform has mapped it.
    pub fn create_window(&mut self, width: u32, height: u32, title: &str) -> Result<(), PlatformError> {
        self.state.pending = Some(
            Window::default_attributes()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(false),
        );

        for _ in 0..MAX_CREATE_PUMPS {
            if let PumpStatus::Exit(code) = self.pump() {
                return Err(PlatformError::ExitedEarly(code));
            }
            if let Some(e) = self.state.create_error.take() {
                return Err(PlatformError::CreateWindow(e));
            }
            if self.state.window.is_some() {
                return Ok(());
            }
        }
        Err(PlatformError::NotInitialized)
    }

    pub fn window(&self) -> Result<&Window, PlatformError> {
        self.state.window.as_ref().ok_or(PlatformError::NotInitialized)
    }

    /// Display and window handles of the live window. Valid for as long as `&self` is.
    pub fn native_handles(&self) -> Result<(DisplayHandle<'_>, WindowHandle<'_>), PlatformError> {
        let window = self.window()?;
        Ok((window.display_handle()?, window.window_handle()?))
    }

    /// Drains whatever is queued right now; never blocks.
    pub fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self.pump() {
            debug!("event loop exit requested (code {code})");
            self.state.close_requested = true;
        }
    }

    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    pub fn destroy_window(&mut self) {
        if self.state.window.take().is_some() {
            // let the platform process the teardown of the native window
            let _ = self.pump();
            info!("window destroyed");
        }
    }

    fn pump(&mut self) -> PumpStatus {
        self.event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_no_window_and_is_open() {
        let state = WindowState::default();
        assert!(state.window.is_none());
        assert!(state.pending.is_none());
        assert!(!state.close_requested);
    }

    #[test]
    fn errors_read_well() {
        assert_eq!(
            PlatformError::NotInitialized.to_string(),
            "window has not been created yet"
        );
        assert!(PlatformError::ExitedEarly(3).to_string().contains("code 3"));
        assert_eq!(
            PlatformError::from(HandleError::Unavailable).to_string(),
            HandleError::Unavailable.to_string()
        );
    }
}
