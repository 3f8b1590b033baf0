use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use kube::CustomResourceExt as _;
use kubevirt_instancetype::{
    admission::{Admission, admit_preference, admit_virtual_machine},
    crd::{instancetype::VirtualMachineInstancetype, preference::VirtualMachinePreference},
    expand::{self, Expander},
    k8s_openapi::apimachinery::pkg::apis::meta::v1::StatusCause,
    logging::{self, LogFormat},
};
use serde::Serialize;
use snafu::{ResultExt as _, Snafu, ensure};
use tracing::info;

use crate::input::Inputs;

mod input;

const APP_NAME: &str = "instancetype-resolver";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to load input objects"))]
    LoadInputs { source: input::Error },

    #[snafu(display("failed to serialize {what}"))]
    Serialize {
        source: serde_yaml::Error,
        what: String,
    },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: io::Error },

    #[snafu(display("failed to expand VirtualMachine {vm:?}"))]
    Expand { source: expand::Error, vm: String },

    #[snafu(display("{rejected} object(s) were rejected"))]
    Rejected { rejected: usize },
}

#[derive(Debug, Parser)]
#[command(name = APP_NAME, author, version, about)]
struct Opts {
    /// Format of the log output, which is written to stderr.
    #[arg(
        long,
        env = "INSTANCETYPE_RESOLVER_LOG_FORMAT",
        value_enum,
        default_value_t
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the CustomResourceDefinitions of the instance type and preference kinds.
    Crd,

    /// Resolve VirtualMachines against their instance types and preferences.
    Resolve(ObjectArgs),

    /// Validate preferences and VirtualMachines like the admission webhook does.
    Validate(ObjectArgs),
}

#[derive(Debug, clap::Args)]
struct ObjectArgs {
    /// YAML files containing VirtualMachines, instance types and preferences.
    #[arg(
        long = "file",
        short = 'f',
        env = "INSTANCETYPE_RESOLVER_FILES",
        value_delimiter = ',',
        required = true
    )]
    files: Vec<PathBuf>,

    /// Print the VirtualMachineInstances the VirtualMachines would start instead of the expanded
    /// VirtualMachines.
    #[arg(long, env = "INSTANCETYPE_RESOLVER_INSTANCES")]
    instances: bool,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging("INSTANCETYPE_RESOLVER_LOG", APP_NAME, opts.log_format)
        .context(InitializeLoggingSnafu)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match opts.command {
        Command::Crd => print_crds(&mut out),
        Command::Resolve(args) => {
            let inputs = Inputs::load(&args.files).context(LoadInputsSnafu)?;
            resolve(&inputs, args.instances, &mut out)
        }
        Command::Validate(args) => {
            let inputs = Inputs::load(&args.files).context(LoadInputsSnafu)?;
            validate(&inputs, &mut out)
        }
    }
}

fn write_document(out: &mut impl Write, what: &str, object: &impl Serialize) -> Result<(), Error> {
    let yaml = serde_yaml::to_string(object).context(SerializeSnafu { what })?;
    write!(out, "---\n{yaml}").context(WriteOutputSnafu)
}

fn print_crds(out: &mut impl Write) -> Result<(), Error> {
    write_document(out, "VirtualMachineInstancetype CRD", &VirtualMachineInstancetype::crd())?;
    write_document(out, "VirtualMachinePreference CRD", &VirtualMachinePreference::crd())
}

fn resolve(inputs: &Inputs, instances: bool, out: &mut impl Write) -> Result<(), Error> {
    let expander = Expander::new(&inputs.store, &inputs.store);

    for vm in &inputs.virtual_machines {
        let name = vm.metadata.name.clone().unwrap_or_default();
        if instances {
            let vmi = expander
                .instantiate(vm)
                .context(ExpandSnafu { vm: name.clone() })?;
            write_document(out, &format!("VirtualMachineInstance {name}"), &vmi)?;
        } else {
            let expanded = expander
                .expand(vm)
                .context(ExpandSnafu { vm: name.clone() })?;
            write_document(out, &format!("VirtualMachine {name}"), &expanded)?;
        }
        info!(vm = %name, "resolved VirtualMachine");
    }
    Ok(())
}

/// One entry of the validation report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResult {
    kind: String,
    name: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    causes: Vec<StatusCause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl ValidationResult {
    fn new(kind: impl ToString, name: String, admission: Admission) -> Self {
        Self {
            kind: kind.to_string(),
            name,
            allowed: admission.allowed(),
            causes: admission.causes,
            warnings: admission.warnings,
        }
    }
}

fn validate(inputs: &Inputs, out: &mut impl Write) -> Result<(), Error> {
    let preferences = inputs.preferences.iter().map(|preference| {
        ValidationResult::new(
            preference.kind,
            preference.name.clone(),
            admit_preference(&preference.spec),
        )
    });
    let virtual_machines = inputs.virtual_machines.iter().map(|vm| {
        ValidationResult::new(
            "VirtualMachine",
            vm.metadata.name.clone().unwrap_or_default(),
            admit_virtual_machine(vm, &inputs.store, &inputs.store),
        )
    });
    let results: Vec<_> = preferences.chain(virtual_machines).collect();

    write_document(out, "validation results", &results)?;

    let rejected = results.iter().filter(|result| !result.allowed).count();
    ensure!(rejected == 0, RejectedSnafu { rejected });
    Ok(())
}
