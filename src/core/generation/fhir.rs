//! Keyword-based FHIR resource detection for generation prompts.

struct UseCase {
    #[allow(dead_code)]
    name: &'static str,
    keywords: &'static [&'static str],
    resources: &'static [&'static str],
}

const USE_CASES: &[UseCase] = &[
    UseCase {
        name: "medication",
        keywords: &[
            "medication",
            "medicine",
            "drug",
            "prescription",
            "pill",
            "dose",
            "pharmacy",
        ],
        resources: &["MedicationRequest", "MedicationStatement", "Medication"],
    },
    UseCase {
        name: "appointments",
        keywords: &["appointment", "schedule", "booking", "visit", "calendar"],
        resources: &["Appointment", "Schedule", "Slot", "Practitioner"],
    },
    UseCase {
        name: "lab-results",
        keywords: &[
            "lab",
            "test result",
            "blood test",
            "diagnostic",
            "laboratory",
        ],
        resources: &["Observation", "DiagnosticReport"],
    },
    UseCase {
        name: "conditions",
        keywords: &[
            "condition",
            "diagnosis",
            "disease",
            "illness",
            "problem list",
        ],
        resources: &["Condition"],
    },
    UseCase {
        name: "care-team",
        keywords: &["care team", "care plan", "provider", "doctor", "nurse"],
        resources: &["CareTeam", "CarePlan", "Practitioner"],
    },
    UseCase {
        name: "immunization",
        keywords: &["vaccine", "vaccination", "immunization", "shot"],
        resources: &["Immunization"],
    },
    UseCase {
        name: "vitals",
        keywords: &[
            "vital",
            "blood pressure",
            "heart rate",
            "temperature",
            "weight",
        ],
        resources: &["Observation"],
    },
    UseCase {
        name: "allergies",
        keywords: &["allergy", "allergies", "allergic", "intolerance"],
        resources: &["AllergyIntolerance"],
    },
];

/// FHIR R4 resource type names. Closed, case-sensitive set.
pub const VALID_FHIR_RESOURCES: &[&str] = &[
    "Account",
    "ActivityDefinition",
    "AdverseEvent",
    "AllergyIntolerance",
    "Appointment",
    "AppointmentResponse",
    "AuditEvent",
    "Basic",
    "Binary",
    "BiologicallyDerivedProduct",
    "BodyStructure",
    "Bundle",
    "CapabilityStatement",
    "CarePlan",
    "CareTeam",
    "CatalogEntry",
    "ChargeItem",
    "ChargeItemDefinition",
    "Claim",
    "ClaimResponse",
    "ClinicalImpression",
    "CodeSystem",
    "Communication",
    "CommunicationRequest",
    "CompartmentDefinition",
    "Composition",
    "ConceptMap",
    "Condition",
    "Consent",
    "Contract",
    "Coverage",
    "CoverageEligibilityRequest",
    "CoverageEligibilityResponse",
    "DetectedIssue",
    "Device",
    "DeviceDefinition",
    "DeviceMetric",
    "DeviceRequest",
    "DeviceUseStatement",
    "DiagnosticReport",
    "DocumentManifest",
    "DocumentReference",
    "EffectEvidenceSynthesis",
    "Encounter",
    "Endpoint",
    "EnrollmentRequest",
    "EnrollmentResponse",
    "EpisodeOfCare",
    "EventDefinition",
    "Evidence",
    "EvidenceVariable",
    "ExampleScenario",
    "ExplanationOfBenefit",
    "FamilyMemberHistory",
    "Flag",
    "Goal",
    "GraphDefinition",
    "Group",
    "GuidanceResponse",
    "HealthcareService",
    "ImagingStudy",
    "Immunization",
    "ImmunizationEvaluation",
    "ImmunizationRecommendation",
    "ImplementationGuide",
    "InsurancePlan",
    "Invoice",
    "Library",
    "Linkage",
    "List",
    "Location",
    "Measure",
    "MeasureReport",
    "Media",
    "Medication",
    "MedicationAdministration",
    "MedicationDispense",
    "MedicationKnowledge",
    "MedicationRequest",
    "MedicationStatement",
    "MedicinalProduct",
    "MedicinalProductAuthorization",
    "MedicinalProductContraindication",
    "MedicinalProductIndication",
    "MedicinalProductIngredient",
    "MedicinalProductInteraction",
    "MedicinalProductManufactured",
    "MedicinalProductPackaged",
    "MedicinalProductPharmaceutical",
    "MedicinalProductUndesirableEffect",
    "MessageDefinition",
    "MessageHeader",
    "MolecularSequence",
    "NamingSystem",
    "NutritionOrder",
    "Observation",
    "ObservationDefinition",
    "OperationDefinition",
    "OperationOutcome",
    "Organization",
    "OrganizationAffiliation",
    "Parameters",
    "Patient",
    "PaymentNotice",
    "PaymentReconciliation",
    "Person",
    "PlanDefinition",
    "Practitioner",
    "PractitionerRole",
    "Procedure",
    "Provenance",
    "Questionnaire",
    "QuestionnaireResponse",
    "RelatedPerson",
    "RequestGroup",
    "ResearchDefinition",
    "ResearchElementDefinition",
    "ResearchStudy",
    "ResearchSubject",
    "RiskAssessment",
    "RiskEvidenceSynthesis",
    "Schedule",
    "SearchParameter",
    "ServiceRequest",
    "Slot",
    "Specimen",
    "SpecimenDefinition",
    "StructureDefinition",
    "StructureMap",
    "Subscription",
    "Substance",
    "SubstanceNucleicAcid",
    "SubstancePolymer",
    "SubstanceProtein",
    "SubstanceReferenceInformation",
    "SubstanceSourceMaterial",
    "SubstanceSpecification",
    "SupplyDelivery",
    "SupplyRequest",
    "Task",
    "TerminologyCapabilities",
    "TestReport",
    "TestScript",
    "ValueSet",
    "VerificationResult",
    "VisionPrescription",
];

/// Detect the FHIR resource types a prompt is likely to need.
///
/// "Patient" always comes first. Remaining resources follow the order in
/// which their use case first matched, without duplicates.
pub fn detect_fhir_resources(prompt: &str) -> Vec<String> {
    // Fold through uppercase so `ı` and `ſ` match the ASCII keywords.
    let lowered = prompt.to_uppercase().to_lowercase();
    let mut resources = vec!["Patient".to_string()];

    for use_case in USE_CASES {
        if !use_case.keywords.iter().any(|kw| lowered.contains(kw)) {
            continue;
        }
        for resource in use_case.resources {
            if !resources.iter().any(|r| r == resource) {
                resources.push((*resource).to_string());
            }
        }
    }

    resources
}

pub fn is_valid_fhir_resource(name: &str) -> bool {
    VALID_FHIR_RESOURCES.contains(&name)
}

pub fn validate_fhir_resources<S: AsRef<str>>(resources: &[S]) -> bool {
    resources.iter().all(|r| is_valid_fhir_resource(r.as_ref()))
}
