//! Built-in category plugins
//!
//! Registration is explicit: call [`register_builtin_plugins`] once while
//! building the registry at startup.

pub mod character;
pub mod equipment;
pub mod pet;

pub use character::CharacterPlugin;
pub use equipment::EquipmentPlugin;
pub use pet::PetPlugin;

use crate::registry::PluginRegistryBuilder;

/// Add the equipment, pet and character plugins to `builder`
pub fn register_builtin_plugins(builder: PluginRegistryBuilder) -> PluginRegistryBuilder {
    builder
        .register(EquipmentPlugin::new())
        .register(PetPlugin::new())
        .register(CharacterPlugin::new())
}
