use clap::{Parser, ValueEnum};
use coarsetime::{Duration, Instant};
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha512};
use tracing_subscriber::EnvFilter;

use kdlink::{Geometry, KdArena, KdLinks, NodeId};

type Point = [f64; 3];

/// Get a prefix of a slice as a reference to a fixed-size array type, if it is long enough.
fn try_prefix<T, const N: usize, U: AsRef<[T]>>(from: &U) -> Option<&[T; N]> {
    from.as_ref().get(..N).map(|s| s.try_into().unwrap())
}

#[derive(Parser)]
#[command(name = "scatter")]
struct Cli {
    /// Number of random points stored in the tree.
    #[arg(long, default_value_t = 200_000)]
    points: usize,
    /// Number of random nearest neighbor queries to run against the tree.
    #[arg(long, default_value_t = 20_000)]
    queries: usize,
    /// How the tree is built from the points.
    #[arg(long, value_enum, default_value_t = Construction::Balanced)]
    build: Construction,
    /// Only points whose first coordinate is at least this value may be returned.
    #[arg(long)]
    min_x: Option<f64>,
    /// Cross-check every n-th query against a linear scan of all points; 0 disables checking.
    #[arg(long, default_value_t = 100)]
    check_every: usize,
    /// Random seed (any string value).
    #[arg(long, env = "SCATTER_SEED")]
    seed: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Construction {
    /// Insert points one at a time, in generation order
    Insert,
    /// Median-split build of minimal height
    Balanced,
}

fn progress_bar(len: usize, prefix: &'static str) -> ProgressBar {
    ProgressBar::new(len as u64)
        .with_style(
            ProgressStyle::with_template(
                "{prefix} {wide_bar} {elapsed_precise}/{eta_precise} | {percent_precise}% | {msg}",
            )
            .unwrap(),
        )
        .with_prefix(prefix)
        .with_finish(ProgressFinish::AndLeave)
}

fn seconds(d: Duration) -> f32 {
    d.as_nanos() as f32 / 1e9
}

fn main() {
    let args = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rng = &mut match args.seed {
        Some(seed) => StdRng::from_seed({
            let mut h = Sha512::new();
            h.update(seed.as_bytes());
            *try_prefix(&h.finalize()).unwrap()
        }),
        None => StdRng::from_entropy(),
    };
    let mut random_point = || -> Point { [rng.gen(), rng.gen(), rng.gen()] };

    println!("generating {} points", args.points);
    let points: Vec<Point> = (0..args.points).map(|_| random_point()).collect();
    let geometry = Geometry::of::<Point>();

    let start_time = Instant::now();
    let tree = match args.build {
        Construction::Insert => {
            let bar = progress_bar(points.len(), "inserting");
            let mut tree = KdArena::with_capacity(points.len());
            for (i, point) in points.iter().enumerate() {
                tree.insert(&geometry, *point);
                if i % 1024 == 0 {
                    bar.set_position(i as u64);
                }
            }
            bar.finish();
            tree
        }
        Construction::Balanced => KdArena::build_balanced(&geometry, points.iter().copied()),
    };
    println!(
        "built {} nodes with height {} in {:.3}s",
        tree.len(),
        tree.height(),
        seconds(Instant::now() - start_time)
    );

    let min_x = args.min_x.unwrap_or(f64::NEG_INFINITY);
    let eligible = |p: &Point| p[0] >= min_x;
    let linear_scan = |query: &Point| -> Option<(NodeId, f64)> {
        tree.ids()
            .filter(|&id| eligible(tree.value(id)))
            .map(|id| (id, geometry.accumulate_distance(query, tree.value(id))))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    };

    let log_frequency = Duration::from_millis(100);
    let bar = progress_bar(args.queries, "querying");
    let start_time = Instant::now();
    let mut last_log = start_time;
    let mut last_log_progress = 0usize;
    let mut next_log = last_log + log_frequency;
    let mut checked = 0usize;
    let mut misses = 0usize;
    for i in 0..args.queries {
        let now = Instant::now();
        if now >= next_log {
            let rate = (i - last_log_progress) as f32 / seconds(now - last_log);
            bar.set_position(i as u64);
            bar.set_message(format!("{rate:.0} queries/sec, {checked} checked"));
            last_log = now;
            last_log_progress = i;
            next_log = now + log_frequency;
        }
        let query = random_point();
        let found = tree.find_nearest_if(&geometry, &query, eligible);
        if found.is_none() {
            misses += 1;
        }
        if args.check_every != 0 && i % args.check_every == 0 {
            let expected = linear_scan(&query);
            assert_eq!(
                found.map(|n| (n.node, n.distance)),
                expected,
                "search disagrees with linear scan for {query:?}"
            );
            checked += 1;
        }
    }
    let total_seconds = seconds(Instant::now() - start_time);
    bar.set_position(args.queries as u64);
    bar.set_message(format!(
        "average {:.0} queries/sec",
        args.queries as f32 / total_seconds
    ));
    bar.finish();
    println!("{checked} queries verified against a linear scan, {misses} found no eligible point");
}
