use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmergencyResource {
    pub name: &'static str,
    pub contact: &'static str,
    pub availability: &'static str,
}

pub const EMERGENCY_RESOURCES: &[EmergencyResource] = &[
    EmergencyResource {
        name: "National Suicide Prevention Lifeline",
        contact: "1-800-273-8255",
        availability: "Available 24/7",
    },
    EmergencyResource {
        name: "Crisis Text Line",
        contact: "Text HOME to 741741",
        availability: "Available 24/7 in the USA",
    },
    EmergencyResource {
        name: "Emergency Services",
        contact: "911",
        availability: "For immediate danger, call emergency services",
    },
];
