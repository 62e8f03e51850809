use anyhow::{Result, bail};
use console::style;

use crate::core::codegen::templates::STARTER_TEMPLATES;
use crate::core::generation::detect_fhir_resources;
use crate::core::terminal::{GuideSection, LOOKING_GLASS, print_warn};

/// `detect <prompt...>`: print the FHIR resources a prompt would target.
pub fn run_detect_command(args: &[String]) -> Result<()> {
    let prompt = args.get(2..).unwrap_or_default().join(" ");
    if prompt.trim().is_empty() {
        bail!("Usage: fhirbuilders detect <prompt...>");
    }

    let resources = detect_fhir_resources(&prompt);
    println!(
        "\n {}{}",
        LOOKING_GLASS,
        style(format!("{} FHIR resources detected", resources.len())).bold()
    );
    for resource in &resources {
        println!("   {} {}", style("•").cyan(), resource);
    }
    if resources.len() == 1 && resources[0] == "Patient" {
        print_warn("No specific healthcare concepts found; defaulting to Patient.");
    }
    println!();
    Ok(())
}

pub fn run_templates_command() {
    let mut section = GuideSection::new("Starter templates");
    for template in STARTER_TEMPLATES {
        section = section
            .command(template.id, template.description)
            .text(&format!(
                "{}",
                style(format!("  resources: {}", template.fhir_resources.join(", "))).dim()
            ));
    }
    section.blank().print();
}
