use crate::types::Framework;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dimension {
    pub key: &'static str,
    pub label: &'static str,
}

/// Static definition of a maturity framework: its dimensions and the closed
/// scoring scale every actual/target value must fall in.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameworkDef {
    pub framework: Framework,
    pub name: &'static str,
    pub description: &'static str,
    pub scale_min: f64,
    pub scale_max: f64,
    pub dimensions: &'static [Dimension],
}

impl FrameworkDef {
    pub fn dimension(&self, key: &str) -> Option<&'static Dimension> {
        self.dimensions.iter().find(|d| d.key == key)
    }

    pub fn in_scale(&self, value: f64) -> bool {
        value.is_finite() && value >= self.scale_min && value <= self.scale_max
    }
}

const fn dim(key: &'static str, label: &'static str) -> Dimension {
    Dimension { key, label }
}

/// The seven DRD axes, in axis-number order (axis N is index N-1).
pub const DRD_AXES: [Dimension; 7] = [
    dim("digital_processes", "Digital Processes"),
    dim("digital_products", "Digital Products"),
    dim("digital_business_models", "Digital Business Models"),
    dim("data_management", "Data Management"),
    dim("digital_culture", "Digital Culture"),
    dim("cybersecurity", "Cybersecurity"),
    dim("artificial_intelligence", "Artificial Intelligence"),
];

const RAPID_LEAN: &[Dimension] = &[
    dim("value_stream", "Value Stream"),
    dim("waste_elimination", "Waste Elimination"),
    dim("flow_pull", "Flow & Pull"),
    dim("standardized_work", "Standardized Work"),
    dim("quality_at_source", "Quality at Source"),
    dim("continuous_improvement", "Continuous Improvement"),
    dim("visual_management", "Visual Management"),
];

/// ADKAR elements in model order; the order matters for the barrier point.
pub const ADKAR_ELEMENTS: &[Dimension] = &[
    dim("awareness", "Awareness"),
    dim("desire", "Desire"),
    dim("knowledge", "Knowledge"),
    dim("ability", "Ability"),
    dim("reinforcement", "Reinforcement"),
];

const CMMI_DMM: &[Dimension] = &[
    dim("data_management_strategy", "Data Management Strategy"),
    dim("data_governance", "Data Governance"),
    dim("data_quality", "Data Quality"),
    dim("data_operations", "Data Operations"),
    dim("platform_architecture", "Platform & Architecture"),
    dim("supporting_processes", "Supporting Processes"),
];

const TECH_DEBT: &[Dimension] = &[
    dim("code_quality", "Code Quality"),
    dim("architecture", "Architecture"),
    dim("infrastructure", "Infrastructure"),
    dim("testing", "Testing"),
    dim("documentation", "Documentation"),
    dim("security", "Security"),
];

static DEFINITIONS: [FrameworkDef; 5] = [
    FrameworkDef {
        framework: Framework::Drd,
        name: "Digital Readiness Diagnosis",
        description: "Seven-axis digital maturity diagnosis scored on levels 1 to 7.",
        scale_min: 1.0,
        scale_max: 7.0,
        dimensions: &DRD_AXES,
    },
    FrameworkDef {
        framework: Framework::RapidLean,
        name: "RapidLean",
        description: "Lean manufacturing maturity across seven practice areas.",
        scale_min: 1.0,
        scale_max: 5.0,
        dimensions: RAPID_LEAN,
    },
    FrameworkDef {
        framework: Framework::Adkar,
        name: "ADKAR",
        description: "Individual change readiness following the ADKAR model.",
        scale_min: 1.0,
        scale_max: 5.0,
        dimensions: ADKAR_ELEMENTS,
    },
    FrameworkDef {
        framework: Framework::CmmiDmm,
        name: "CMMI Data Management Maturity",
        description: "Data management capability across six process areas.",
        scale_min: 1.0,
        scale_max: 5.0,
        dimensions: CMMI_DMM,
    },
    FrameworkDef {
        framework: Framework::TechDebt,
        name: "Technical Debt",
        description: "Health of the software estate across six engineering areas.",
        scale_min: 1.0,
        scale_max: 5.0,
        dimensions: TECH_DEBT,
    },
];

pub fn definition(framework: Framework) -> &'static FrameworkDef {
    match framework {
        Framework::Drd => &DEFINITIONS[0],
        Framework::RapidLean => &DEFINITIONS[1],
        Framework::Adkar => &DEFINITIONS[2],
        Framework::CmmiDmm => &DEFINITIONS[3],
        Framework::TechDebt => &DEFINITIONS[4],
    }
}

pub fn all() -> &'static [FrameworkDef] {
    &DEFINITIONS
}
