use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFile {
    pub path: &'static str,
    pub code: &'static str,
}

/// A built-in reference app handed to the model as an example.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarterTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub fhir_resources: &'static [&'static str],
    #[serde(skip_serializing)]
    pub files: &'static [TemplateFile],
}

pub const STARTER_TEMPLATES: &[StarterTemplate] = &[
    StarterTemplate {
        id: "patient-portal",
        name: "Patient Portal",
        description: "Patient-facing portal with demographics, conditions and care team",
        fhir_resources: &["Patient", "Condition", "CareTeam", "Practitioner"],
        files: &[
            TemplateFile {
                path: "app/page.tsx",
                code: r#"import { useMedplumProfile } from '@medplum/react';
import { Patient } from '@medplum/fhirtypes';
import { ConditionList } from '@/components/ConditionList';

export default function PortalHome() {
  const profile = useMedplumProfile() as Patient | undefined;
  if (!profile) return <p className="p-4">Loading...</p>;
  return (
    <main className="mx-auto max-w-3xl p-6">
      <h1 className="text-2xl font-semibold">Welcome back</h1>
      <ConditionList patientId={profile.id as string} />
    </main>
  );
}
"#,
            },
            TemplateFile {
                path: "components/ConditionList.tsx",
                code: r#"import { useSearchResources } from '@medplum/react';

export function ConditionList({ patientId }: { patientId: string }) {
  const [conditions] = useSearchResources('Condition', { subject: `Patient/${patientId}` });
  return (
    <ul className="mt-4 space-y-2">
      {conditions?.map((c) => (
        <li key={c.id} className="rounded border p-3">{c.code?.text}</li>
      ))}
    </ul>
  );
}
"#,
            },
        ],
    },
    StarterTemplate {
        id: "medication-tracker",
        name: "Medication Tracker",
        description: "Track active prescriptions and doses taken",
        fhir_resources: &[
            "Patient",
            "MedicationRequest",
            "MedicationStatement",
            "Medication",
        ],
        files: &[TemplateFile {
            path: "components/MedicationList.tsx",
            code: r#"import { useSearchResources } from '@medplum/react';
import { MedicationRequest } from '@medplum/fhirtypes';

export function MedicationList({ patientId }: { patientId: string }) {
  const [requests] = useSearchResources('MedicationRequest', {
    subject: `Patient/${patientId}`,
    status: 'active',
  });
  return (
    <ul className="divide-y">
      {requests?.map((r: MedicationRequest) => (
        <li key={r.id} className="py-2">
          {r.medicationCodeableConcept?.text} - {r.dosageInstruction?.[0]?.text}
        </li>
      ))}
    </ul>
  );
}
"#,
        }],
    },
    StarterTemplate {
        id: "appointment-scheduler",
        name: "Appointment Scheduler",
        description: "Browse open slots and book appointments with practitioners",
        fhir_resources: &["Patient", "Appointment", "Schedule", "Slot", "Practitioner"],
        files: &[TemplateFile {
            path: "components/SlotPicker.tsx",
            code: r#"import { useSearchResources } from '@medplum/react';
import { Slot } from '@medplum/fhirtypes';

export function SlotPicker({ onPick }: { onPick: (slot: Slot) => void }) {
  const [slots] = useSearchResources('Slot', { status: 'free', _sort: 'start' });
  return (
    <div className="grid grid-cols-3 gap-2">
      {slots?.map((s) => (
        <button key={s.id} className="rounded border p-2" onClick={() => onPick(s)}>
          {new Date(s.start as string).toLocaleString()}
        </button>
      ))}
    </div>
  );
}
"#,
        }],
    },
    StarterTemplate {
        id: "lab-results-dashboard",
        name: "Lab Results Dashboard",
        description: "Chart observations and list diagnostic reports",
        fhir_resources: &["Patient", "Observation", "DiagnosticReport"],
        files: &[TemplateFile {
            path: "components/ReportTable.tsx",
            code: r#"import { useSearchResources } from '@medplum/react';

export function ReportTable({ patientId }: { patientId: string }) {
  const [reports] = useSearchResources('DiagnosticReport', { subject: `Patient/${patientId}` });
  return (
    <table className="w-full text-left">
      <tbody>
        {reports?.map((r) => (
          <tr key={r.id}><td>{r.code?.text}</td><td>{r.status}</td></tr>
        ))}
      </tbody>
    </table>
  );
}
"#,
        }],
    },
];

pub fn find_template(id: &str) -> Option<&'static StarterTemplate> {
    STARTER_TEMPLATES.iter().find(|t| t.id == id)
}

/// Template sharing the most non-Patient resources with `resources`.
/// Ties go to the earlier template; no overlap means no template.
pub fn best_matching_template<S: AsRef<str>>(resources: &[S]) -> Option<&'static StarterTemplate> {
    let mut best: Option<(&'static StarterTemplate, usize)> = None;
    for template in STARTER_TEMPLATES {
        let overlap = template
            .fhir_resources
            .iter()
            .filter(|r| **r != "Patient")
            .filter(|r| resources.iter().any(|x| x.as_ref() == **r))
            .count();
        if overlap == 0 {
            continue;
        }
        if best.is_none_or(|(_, score)| overlap > score) {
            best = Some((template, overlap));
        }
    }
    best.map(|(template, _)| template)
}
