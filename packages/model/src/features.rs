//! Ward + intervention feature vectors.

use urban_sim_simulation_models::InterventionDescriptor;
use urban_sim_ward::Ward;
use urban_sim_ward_models::{ATTRIBUTE_SCHEMA_VERSION, WardAttribute};

use crate::ModelError;
use crate::params::{EncodingEntry, FeatureParams};

/// Version of the feature layout produced by [`FeatureBuilder`].
///
/// Layout v1: every ward attribute in [`WardAttribute::all()`] order, one
/// one-hot slot per encoded intervention type (by encoding index), then
/// the normalized intervention magnitude.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Name of the trailing magnitude feature.
pub const MAGNITUDE_FEATURE: &str = "intervention_magnitude";

/// A model input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema_version: u32,
    values: Vec<f64>,
    missing: Vec<WardAttribute>,
}

impl FeatureVector {
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Ward attributes that had no value and were imputed at the training
    /// mean.
    #[must_use]
    pub fn missing(&self) -> &[WardAttribute] {
        &self.missing
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds [`FeatureVector`]s from wards and intervention descriptors.
///
/// Holds only the persisted parameters, so building is a pure function of
/// its inputs.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    params: FeatureParams,
    encodings: Vec<EncodingEntry>,
    names: Vec<String>,
}

impl FeatureBuilder {
    /// Creates a builder from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`FeatureParams::validate`].
    pub fn new(params: FeatureParams) -> Result<Self, ModelError> {
        params.validate()?;

        let mut encodings = params.interventions.clone();
        encodings.sort_by_key(|e| e.index);

        let names = WardAttribute::all()
            .iter()
            .map(ToString::to_string)
            .chain(
                encodings
                    .iter()
                    .map(|e| format!("intervention_{}", e.intervention_type)),
            )
            .chain(std::iter::once(MAGNITUDE_FEATURE.to_string()))
            .collect();

        Ok(Self {
            params,
            encodings,
            names,
        })
    }

    /// Position names of the vectors this builder produces.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub const fn params(&self) -> &FeatureParams {
        &self.params
    }

    /// Fails unless a registry snapshot with attribute schema
    /// `registry_version` can be fed to this builder.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaVersionMismatch`] on any difference.
    pub fn check_schema(&self, registry_version: u32) -> Result<(), ModelError> {
        let expected = self.params.attribute_schema_version;
        if registry_version == expected && registry_version == ATTRIBUTE_SCHEMA_VERSION {
            Ok(())
        } else {
            Err(ModelError::SchemaVersionMismatch(format!(
                "ward snapshot uses attribute schema v{registry_version}, feature builder expects v{expected}"
            )))
        }
    }

    /// Builds the feature vector for `descriptor` applied to `ward`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedIntervention`] if the intervention
    /// type was not part of training, and [`ModelError::InvalidParameter`]
    /// for unknown, missing, negative or non-finite magnitude parameters.
    pub fn build(
        &self,
        ward: &Ward,
        descriptor: &InterventionDescriptor,
    ) -> Result<FeatureVector, ModelError> {
        let encoding = self
            .params
            .encoding(descriptor.intervention_type)
            .ok_or_else(|| ModelError::UnsupportedIntervention {
                intervention: descriptor.intervention_type.to_string(),
            })?;
        let magnitude = magnitude(encoding, descriptor)?;

        let attributes = ward.attributes();
        let mut values = Vec::with_capacity(self.names.len());
        let mut missing = Vec::new();

        for entry in &self.params.normalization {
            if let Some(value) = attributes.get(entry.attribute) {
                values.push(entry.apply(value));
            } else {
                missing.push(entry.attribute);
                values.push(0.0);
            }
        }

        values.extend(self.encodings.iter().map(|e| {
            if e.intervention_type == encoding.intervention_type {
                1.0
            } else {
                0.0
            }
        }));
        values.push(magnitude);

        if !missing.is_empty() {
            log::debug!(
                "Ward {} missing {} attribute(s), imputed at training mean",
                ward.code(),
                missing.len()
            );
        }

        Ok(FeatureVector {
            schema_version: FEATURE_SCHEMA_VERSION,
            values,
            missing,
        })
    }
}

/// Normalized magnitude for the intervention's single parameter.
fn magnitude(
    encoding: &EncodingEntry,
    descriptor: &InterventionDescriptor,
) -> Result<f64, ModelError> {
    if let Some(unknown) = descriptor
        .params
        .keys()
        .find(|name| **name != encoding.magnitude_param)
    {
        return Err(ModelError::InvalidParameter {
            name: unknown.clone(),
            reason: format!(
                "{} accepts only '{}'",
                encoding.intervention_type, encoding.magnitude_param
            ),
        });
    }

    let value = descriptor
        .params
        .get(&encoding.magnitude_param)
        .copied()
        .or(encoding.default)
        .ok_or_else(|| ModelError::InvalidParameter {
            name: encoding.magnitude_param.clone(),
            reason: "required".to_string(),
        })?;

    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::InvalidParameter {
            name: encoding.magnitude_param.clone(),
            reason: format!("{value} is not a non-negative number"),
        });
    }

    Ok(value / encoding.reference)
}
