//! Runs the fixed-point driver on a built-in counting loop.
//!
//! Run with:
//! ```bash
//! cargo run --example analyze -- --max-n 50 --domain enum-solver --template zones --show-imprecise-vars
//! ```

use clap::{Parser, ValueEnum};
use log::info;

use ssa_invariant::bdd_solver::BddSolver;
use ssa_invariant::config::{Config, Options};
use ssa_invariant::expr::{Expr, Sort};
use ssa_invariant::fixed_point::SsaFixedPoint;
use ssa_invariant::ssa::{LocalSsa, SourceLocation, SsaNode};

/// Option selecting the domain family.
#[derive(Debug, Copy, Clone, ValueEnum)]
enum DomainFlag {
    ComputeRankingFunctions,
    Equalities,
    Heap,
    HeapInterval,
    HeapZones,
    PredabsSolver,
    EnumSolver,
    BinsearchSolver,
}

impl DomainFlag {
    fn name(self) -> &'static str {
        match self {
            DomainFlag::ComputeRankingFunctions => "compute-ranking-functions",
            DomainFlag::Equalities => "equalities",
            DomainFlag::Heap => "heap",
            DomainFlag::HeapInterval => "heap-interval",
            DomainFlag::HeapZones => "heap-zones",
            DomainFlag::PredabsSolver => "predabs-solver",
            DomainFlag::EnumSolver => "enum-solver",
            DomainFlag::BinsearchSolver => "binsearch-solver",
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum ShapeFlag {
    Intervals,
    Zones,
    Octagons,
}

impl ShapeFlag {
    fn name(self) -> &'static str {
        match self {
            ShapeFlag::Intervals => "intervals",
            ShapeFlag::Zones => "zones",
            ShapeFlag::Octagons => "octagons",
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Invariant inference for a counting loop")]
struct Cli {
    /// Upper bound on the loop limit `N`, none if omitted
    #[arg(long)]
    max_n: Option<i64>,

    /// Analyze a second, identical version of the loop alongside
    #[arg(long)]
    differential: bool,

    /// Abstract domain and solver
    #[arg(long, value_enum, default_value = "enum-solver")]
    domain: DomainFlag,

    /// Template shape of the numeric domains
    #[arg(long, value_enum)]
    template: Option<ShapeFlag>,

    /// Single-component ranking functions
    #[arg(long)]
    monolithic_ranking_function: bool,

    /// Split heap-template values by symbolic path
    #[arg(long)]
    sympath: bool,

    /// Report the variables the invariant says nothing about
    #[arg(long)]
    show_imprecise_vars: bool,

    /// Width of integer variables in bits
    #[arg(long)]
    bitwidth: Option<usize>,

    /// Oracle size beyond which checks answer unknown
    #[arg(long)]
    node_limit: Option<usize>,

    #[arg(long)]
    max_ranking_components: Option<usize>,

    #[arg(long)]
    max_ranking_refinements: Option<usize>,

    #[arg(long)]
    max_heap_targets: Option<usize>,

    /// Variables whose stand-alone bounds are left out of templates
    #[arg(long, value_delimiter = ',')]
    withhold: Vec<String>,
}

impl Cli {
    fn options(&self) -> Options {
        let mut options = Options::new().set(self.domain.name());
        if let Some(shape) = self.template {
            options = options.set(shape.name());
        }
        for (flag, on) in [
            ("monolithic-ranking-function", self.monolithic_ranking_function),
            ("sympath", self.sympath),
            ("show-imprecise-vars", self.show_imprecise_vars),
        ] {
            if on {
                options = options.set(flag);
            }
        }
        for (key, value) in [
            ("bitwidth", self.bitwidth),
            ("node-limit", self.node_limit),
            ("max-ranking-components", self.max_ranking_components),
            ("max-ranking-refinements", self.max_ranking_refinements),
            ("max-heap-targets", self.max_heap_targets),
        ] {
            if let Some(value) = value {
                options = options.set_value(key, value.to_string());
            }
        }
        if !self.withhold.is_empty() {
            options = options.set_value("withhold", self.withhold.join(","));
        }
        options
    }
}

fn counting_loop() -> LocalSsa {
    let src = |line| SourceLocation::new("count.c", line);
    let ls = || Expr::bool_var("$guard#ls4");
    let in_loop = || Expr::lt(Expr::var("i#phi2"), Expr::var("N#phi2"));

    let mut ssa = LocalSsa::new("count");
    ssa.add_input("N", Sort::Int);
    ssa.push(SsaNode::new(1, src(3)).assign("i#1", Expr::int(0)));
    let head = ssa.push(
        SsaNode::new(2, src(4))
            .assign("i#phi2", Expr::ite(ls(), Expr::var("i#lb4"), Expr::var("i#1")))
            .assign("N#phi2", Expr::ite(ls(), Expr::var("N#lb4"), Expr::var("N")))
            .branch(in_loop()),
    );
    ssa.push(
        SsaNode::new(3, src(5))
            .guarded(in_loop())
            .assign("i#3", Expr::add(Expr::var("i#phi2"), Expr::int(1))),
    );
    let back = ssa.push(
        SsaNode::new(4, src(6))
            .guarded(in_loop())
            .loop_var("i#lb4", Expr::var("i#3"))
            .loop_var("N#lb4", Expr::var("N#phi2")),
    );
    ssa.close_loop(back, head);
    ssa.push(
        SsaNode::new(5, src(7))
            .guarded(Expr::not(in_loop()))
            .assert("i == N", Expr::eq(Expr::var("i#phi2"), Expr::var("N#phi2"))),
    );
    ssa
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();
    info!("cli = {:?}", cli);

    let config = Config::from_options(&cli.options())?;
    let mut precondition = Expr::ge(Expr::var("N"), Expr::int(0));
    if let Some(max_n) = cli.max_n {
        precondition = Expr::and([precondition, Expr::le(Expr::var("N"), Expr::int(max_n))]);
    }

    let time_total = std::time::Instant::now();
    let mut oracle = BddSolver::from_config(&config)?;
    let ssa = counting_loop();
    let mut fp = if cli.differential {
        SsaFixedPoint::differential(config, ssa.clone(), &ssa)
    } else {
        SsaFixedPoint::new(config, ssa)
    }
    .with_precondition(precondition);
    fp.run(&mut oracle)?;

    println!("passes: {}", fp.iteration_number());
    println!("invariant: {}", fp.invariant());
    for property in fp.properties() {
        println!("{}", property);
    }
    for var in fp.imprecise_vars() {
        println!("imprecise: {}", var);
    }
    println!("{}", fp.statistics());
    println!("Total time: {:?}", time_total.elapsed());

    Ok(())
}
