use clap::{Parser, Subcommand};
use fitcheck_core::resources::resource_list_to_k8s;
use fitcheck_core::{read_manifest, to_json, to_json_pretty, Node, Pod, ResourceList, Taint};
use fitcheck_scheduling::filter::filter_node;
use fitcheck_scheduling::taints::{do_not_schedule_filter, no_execute_filter};
use fitcheck_scheduling::{
    default_filters, find_matching_untolerated_taint, pod_limits, pod_priority, pod_requests,
    ContainerType, PodResources, PodResourcesOptions, SchedulingContext,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "fitcheck", about = "Pod resource and taint fit calculations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective resource requests of a pod
    Requests {
        /// Path to the pod manifest (YAML or JSON)
        pod: PathBuf,
        /// Leave pod overhead out of the result
        #[arg(long)]
        exclude_overhead: bool,
        /// Log each container's contribution
        #[arg(long)]
        per_container: bool,
    },
    /// Print the effective resource limits of a pod
    Limits {
        /// Path to the pod manifest (YAML or JSON)
        pod: PathBuf,
        /// Leave pod overhead out of the result
        #[arg(long)]
        exclude_overhead: bool,
        /// Log each container's contribution
        #[arg(long)]
        per_container: bool,
    },
    /// Print the first node taint the pod does not tolerate
    Taints {
        /// Path to the pod manifest
        #[arg(long)]
        pod: PathBuf,
        /// Path to the node manifest
        #[arg(long)]
        node: PathBuf,
        /// Only consider taints with this effect class
        #[arg(long, value_enum, default_value_t = TaintScope::All)]
        scope: TaintScope,
    },
    /// Run the eligibility filters for a pod against one or more nodes
    Filter {
        /// Path to the pod manifest
        #[arg(long)]
        pod: PathBuf,
        /// Paths to node manifests
        #[arg(long = "node", required = true)]
        nodes: Vec<PathBuf>,
    },
    /// Print the priority of a pod
    Priority {
        /// Path to the pod manifest
        pod: PathBuf,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TaintScope {
    /// Every taint
    All,
    /// NoSchedule and NoExecute taints
    Schedule,
    /// NoExecute taints only
    Execute,
}

#[derive(Clone, Copy)]
enum Aggregate {
    Requests,
    Limits,
}

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Requests {
            pod,
            exclude_overhead,
            per_container,
        } => run_aggregate(&pod, Aggregate::Requests, exclude_overhead, per_container),
        Commands::Limits {
            pod,
            exclude_overhead,
            per_container,
        } => run_aggregate(&pod, Aggregate::Limits, exclude_overhead, per_container),
        Commands::Taints { pod, node, scope } => run_taints(&pod, &node, scope),
        Commands::Filter { pod, nodes } => run_filter(&pod, &nodes),
        Commands::Priority { pod } => {
            let pod: Pod = read_manifest(&pod)?;
            println!("{}", pod_priority(&pod));
            Ok(())
        }
    }
}

/// Compute requests or limits and print them as JSON
fn run_aggregate(
    path: &Path,
    aggregate: Aggregate,
    exclude_overhead: bool,
    per_container: bool,
) -> miette::Result<()> {
    let pod: Pod = read_manifest(path)?;
    let resources = PodResources::try_from(&pod)?;

    let mut index = 0usize;
    let mut log_container = |res: &ResourceList, kind: ContainerType| {
        info!(
            "{:?} #{}: {}",
            kind,
            index,
            to_json(&resource_list_to_k8s(res)).unwrap_or_default()
        );
        index += 1;
    };

    let container_fn = if per_container {
        Some(&mut log_container as &mut dyn FnMut(&ResourceList, ContainerType))
    } else {
        None
    };
    let opts = PodResourcesOptions {
        exclude_overhead,
        container_fn,
        ..Default::default()
    };

    let total = match aggregate {
        Aggregate::Requests => pod_requests(&resources, Some(opts)),
        Aggregate::Limits => pod_limits(&resources, Some(opts)),
    };

    println!("{}", to_json_pretty(&resource_list_to_k8s(&total))?);
    Ok(())
}

/// Report the first untolerated taint of a node
fn run_taints(pod_path: &Path, node_path: &Path, scope: TaintScope) -> miette::Result<()> {
    let pod: Pod = read_manifest(pod_path)?;
    let node: Node = read_manifest(node_path)?;

    let taints = node
        .spec
        .as_ref()
        .and_then(|s| s.taints.as_deref())
        .unwrap_or_default();
    let tolerations = pod
        .spec
        .as_ref()
        .and_then(|s| s.tolerations.as_deref())
        .unwrap_or_default();

    let filter: Option<&dyn Fn(&Taint) -> bool> = match scope {
        TaintScope::All => None,
        TaintScope::Schedule => Some(&do_not_schedule_filter),
        TaintScope::Execute => Some(&no_execute_filter),
    };

    match find_matching_untolerated_taint(taints, tolerations, filter) {
        Some(taint) => println!("{}", to_json_pretty(taint)?),
        None => info!("All {} taints are tolerated", taints.len()),
    }
    Ok(())
}

/// Run the default filters against each node and print the results
fn run_filter(pod_path: &Path, node_paths: &[PathBuf]) -> miette::Result<()> {
    let pod: Pod = read_manifest(pod_path)?;
    let context = SchedulingContext::new(pod)?;
    let filters = default_filters();

    info!(
        "Filtering {} nodes for pod {}",
        node_paths.len(),
        context.pod_name()
    );

    for path in node_paths {
        let node: Node = read_manifest(path)?;
        let result = filter_node(&context, &node, &filters);
        match result.reason {
            None => println!("{}: feasible", result.node_name),
            Some(reason) => println!("{}: {}", result.node_name, reason),
        }
    }

    Ok(())
}
