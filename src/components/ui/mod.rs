pub mod button;
pub mod card;
pub mod menu;
pub mod spinner;

// Re-export component symbols so callers can `use crate::components::ui::Button` etc.
pub use button::*;
#[allow(unused_imports)]
pub use card::*;
#[allow(unused_imports)]
pub use menu::*;
#[allow(unused_imports)]
pub use spinner::*;
