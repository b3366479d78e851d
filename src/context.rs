use crate::settings::Settings;
use crate::surface::PreviewSurface;
use crate::timer::Clock;

/// Shared state handed to every component call.
///
/// Components own their own state; everything they share with the page lives here.
pub struct PageContext<'a> {
    pub clock: &'a mut Clock,
    pub settings: &'a Settings,
    pub surface: &'a mut dyn PreviewSurface,
}
