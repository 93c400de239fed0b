// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine builder utilities for tests.

use echo_xcodec::{CodecError, Config, ConfigBuilder, Engine};

use crate::models::{
    Address, Color, Node, PackedRgb, Person, PersonV2, Rgb, Shape, ADDRESS_ID, COLOR_ID,
    NAMESPACE, NODE_ID, PERSON_ID, RGB_ID, SHAPE_ID,
};

/// Which set of sample models a built engine registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Models {
    None,
    ById,
    ByName,
    Evolved,
}

/// Builder for creating test engines with common configurations.
///
/// # Example
///
/// ```
/// use echo_dry_tests::{sample_person, EngineTestBuilder, Person};
///
/// let mut engine = EngineTestBuilder::new()
///     .compatible(true)
///     .with_models()
///     .build()
///     .unwrap();
/// let bytes = engine.serialize(&sample_person()).unwrap();
/// assert_eq!(engine.deserialize::<Person>(&bytes).unwrap(), sample_person());
/// ```
#[derive(Debug, Clone)]
pub struct EngineTestBuilder {
    config: ConfigBuilder,
    models: Models,
}

impl Default for EngineTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineTestBuilder {
    /// Create a new builder with default settings and no registrations.
    pub fn new() -> Self {
        Self {
            config: Config::builder(),
            models: Models::None,
        }
    }

    /// Set the cross-language flag.
    pub fn xlang(mut self, on: bool) -> Self {
        self.config = self.config.xlang(on);
        self
    }

    /// Enable reference tracking.
    pub fn track_ref(mut self, on: bool) -> Self {
        self.config = self.config.track_ref(on);
        self
    }

    /// Enable compatible mode.
    pub fn compatible(mut self, on: bool) -> Self {
        self.config = self.config.compatible(on);
        self
    }

    /// Enable struct version hashes.
    pub fn check_struct_version(mut self, on: bool) -> Self {
        self.config = self.config.check_struct_version(on);
        self
    }

    /// Bound nesting depth.
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config = self.config.max_depth(depth);
        self
    }

    /// Toggle canonicalization.
    pub fn canonicalize(mut self, on: bool) -> Self {
        self.config = self.config.canonicalize(on);
        self
    }

    /// Register the sample models by numeric id.
    pub fn with_models(mut self) -> Self {
        self.models = Models::ById;
        self
    }

    /// Register the sample models under [`NAMESPACE`].
    pub fn with_named_models(mut self) -> Self {
        self.models = Models::ByName;
        self
    }

    /// Register [`PersonV2`] in place of [`Person`].
    pub fn with_evolved_models(mut self) -> Self {
        self.models = Models::Evolved;
        self
    }

    /// Build the engine with configured settings.
    ///
    /// # Errors
    /// Propagates config validation and registration failures.
    pub fn build(self) -> Result<Engine, CodecError> {
        let mut engine = Engine::new(self.config.build()?);
        match self.models {
            Models::None => {}
            Models::ById => {
                register_shared_models(&mut engine)?;
                engine.register::<Person>(PERSON_ID)?;
            }
            Models::Evolved => {
                register_shared_models(&mut engine)?;
                engine.register::<PersonV2>(PERSON_ID)?;
            }
            Models::ByName => {
                engine.register_by_name::<Address>(NAMESPACE, "Address")?;
                engine.register_by_name::<Color>(NAMESPACE, "Color")?;
                engine.register_by_name::<Shape>(NAMESPACE, "Shape")?;
                engine.register_by_name::<Node>(NAMESPACE, "Node")?;
                engine.register_by_name::<Person>(NAMESPACE, "Person")?;
                engine.register_ext_by_name::<Rgb, _>(NAMESPACE, "Rgb", PackedRgb)?;
            }
        }
        Ok(engine)
    }
}

fn register_shared_models(engine: &mut Engine) -> Result<(), CodecError> {
    engine.register::<Address>(ADDRESS_ID)?;
    engine.register::<Color>(COLOR_ID)?;
    engine.register::<Shape>(SHAPE_ID)?;
    engine.register::<Node>(NODE_ID)?;
    engine.register_ext::<Rgb, _>(RGB_ID, PackedRgb)
}
