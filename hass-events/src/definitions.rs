//! Item types, unit dimensions and group functions the server accepts

use crate::error::DefinitionError;
use crate::event::ItemDefinition;

pub const ITEM_TYPES: &[&str] = &[
    "Call",
    "Color",
    "Contact",
    "DateTime",
    "Dimmer",
    "Group",
    "Image",
    "Location",
    "Number",
    "Player",
    "Rollershutter",
    "String",
    "Switch",
];

/// Dimensions usable as `Number:<Dimension>`
pub const ITEM_DIMENSIONS: &[&str] = &[
    "Acceleration",
    "AmountOfSubstance",
    "Angle",
    "Area",
    "ArealDensity",
    "CatalyticActivity",
    "Density",
    "Dimensionless",
    "ElectricCapacitance",
    "ElectricCharge",
    "ElectricConductance",
    "ElectricCurrent",
    "ElectricInductance",
    "ElectricPotential",
    "ElectricResistance",
    "Energy",
    "Force",
    "Frequency",
    "Illuminance",
    "Intensity",
    "Length",
    "LuminousFlux",
    "LuminousIntensity",
    "MagneticFlux",
    "MagneticFluxDensity",
    "Mass",
    "Power",
    "Pressure",
    "RadiationDoseAbsorbed",
    "RadiationDoseEffective",
    "Radioactivity",
    "SolidAngle",
    "Speed",
    "Temperature",
    "Time",
    "Volume",
    "VolumetricFlowRate",
];

pub const GROUP_FUNCTIONS: &[&str] = &["AND", "OR", "NAND", "NOR", "AVG", "MAX", "MIN", "SUM"];

/// Check an item definition before it is sent to the server.
///
/// `Type:Dimension` types need a known base type and dimension. Group
/// fields are only allowed on `Group` items.
pub fn validate_definition(item: &ItemDefinition) -> Result<(), DefinitionError> {
    let base_type = match item.item_type.split_once(':') {
        Some((base, dimension)) => {
            if !ITEM_DIMENSIONS.contains(&dimension) {
                return Err(DefinitionError::UnknownDimension(dimension.to_string()));
            }
            base
        }
        None => item.item_type.as_str(),
    };
    if !ITEM_TYPES.contains(&base_type) {
        return Err(DefinitionError::UnknownType(base_type.to_string()));
    }

    if item.group_type.is_some() || item.function.is_some() {
        if item.item_type != "Group" {
            return Err(DefinitionError::NotAGroup(item.item_type.clone()));
        }
        if let Some(function) = &item.function {
            if !GROUP_FUNCTIONS.contains(&function.name.as_str()) {
                return Err(DefinitionError::UnknownGroupFunction(function.name.clone()));
            }
        }
    }

    Ok(())
}
