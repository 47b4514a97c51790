mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use state::Simulation;
use treasury::{Clock, CurrencyLedger, ProposalParams, TokenLedger, TreasuryConfig};

#[derive(Parser)]
#[command(name = "proposal-cli")]
#[command(about = "Treasury proposal governance simulator")]
struct Cli {
    /// Simulation state file
    #[arg(long, global = true, default_value = "treasury-state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the token and the treasury engine
    Init {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Account receiving the initial token supply
        #[arg(long, default_value = "admin")]
        admin: String,

        #[arg(long, default_value_t = 10_000)]
        supply: u64,

        /// Starting timestamp (defaults to the wall clock)
        #[arg(long)]
        now: Option<u64>,
    },

    /// Mint new tokens to an account
    Mint {
        account: String,
        #[arg(short, long)]
        amount: u64,
    },

    /// Transfer tokens between accounts
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        amount: u64,
    },

    /// Allow the treasury to pull tokens from an account
    Approve {
        #[arg(long)]
        owner: String,
        #[arg(short, long)]
        amount: u64,
    },

    /// Grant the member role
    Grant { account: String },

    /// Revoke the member role
    Revoke { account: String },

    /// Create a new proposal
    Create {
        #[arg(short, long)]
        recipient: String,

        /// Currency units sent to the recipient on execution
        #[arg(short, long)]
        amount: u128,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Debating period in seconds
        #[arg(short, long, default_value_t = treasury::DEFAULT_MIN_DEBATING_PERIOD)]
        period: u64,

        /// Currency sent with the proposal (defaults to the amount)
        #[arg(short, long)]
        funded: Option<u128>,
    },

    /// Deposit tokens as voting weight
    Deposit {
        #[arg(long)]
        account: String,
        #[arg(short, long)]
        amount: u64,
    },

    /// Vote for a proposal
    Vote {
        #[arg(long)]
        account: String,
        #[arg(short, long)]
        id: u64,
        #[arg(short, long)]
        amount: u64,
    },

    /// Withdraw a vote
    Unvote {
        #[arg(long)]
        account: String,
        #[arg(short, long)]
        id: u64,
    },

    /// Execute a closed proposal that reached quorum
    Execute {
        #[arg(short, long)]
        id: u64,
    },

    /// Move the simulated clock forward
    Advance { seconds: u64 },

    /// List all proposals
    List,

    /// Get proposal details
    Get {
        #[arg(short, long)]
        id: u64,
    },

    /// Show token, deposit and currency balances of an account
    Balance { account: String },

    /// Print the event log
    Events,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Commands::Init {
        config,
        admin,
        supply,
        now,
    } = &cli.command
    {
        let config = match config {
            Some(path) => TreasuryConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => TreasuryConfig::default(),
        };
        let now = now.unwrap_or_else(|| treasury::SystemClock.now());
        let sim = Simulation::deploy(config, admin, *supply, now)?;
        sim.save(&cli.state)?;
        println!(
            "Deployed treasury: {} {} minted to {}, state at {}",
            supply,
            sim.engine.config().token,
            admin,
            cli.state.display()
        );
        return Ok(());
    }

    let mut sim = Simulation::load(&cli.state)?;
    let mutated = run(&mut sim, cli.command)?;
    if mutated {
        sim.save(&cli.state)?;
    }
    Ok(())
}

/// Execute one command; returns whether the state changed
fn run(sim: &mut Simulation, command: Commands) -> Result<bool> {
    match command {
        Commands::Init { .. } => anyhow::bail!("treasury already initialised"),
        Commands::Mint { account, amount } => {
            sim.token.mint(&account, amount)?;
            println!("Minted {} to {}", amount, account);
        }
        Commands::Transfer { from, to, amount } => {
            sim.token.transfer(&from, &to, amount)?;
            println!("Transferred {} from {} to {}", amount, from, to);
        }
        Commands::Approve { owner, amount } => {
            let spender = sim.engine.config().engine_account.clone();
            sim.token.approve(&owner, &spender, amount);
            println!("{} approved {} to pull {}", owner, spender, amount);
        }
        Commands::Grant { account } => {
            sim.members.grant(&account);
            println!("Granted member role to {}", account);
        }
        Commands::Revoke { account } => {
            sim.members.revoke(&account);
            println!("Revoked member role from {}", account);
        }
        Commands::Create {
            recipient,
            amount,
            description,
            period,
            funded,
        } => {
            let params = ProposalParams::new(&recipient, amount, &description, period);
            let (_, event) = sim
                .engine
                .create_proposal(params, funded.unwrap_or(amount))?;
            println!("{}", event);
        }
        Commands::Deposit { account, amount } => {
            let balance = sim.engine.deposit(&account, amount)?;
            println!("{} deposited {} (balance {})", account, amount, balance);
        }
        Commands::Vote {
            account,
            id,
            amount,
        } => {
            println!("{}", sim.engine.vote(&account, id, amount)?);
        }
        Commands::Unvote { account, id } => {
            println!("{}", sim.engine.unvote(&account, id)?);
        }
        Commands::Execute { id } => {
            println!("{}", sim.engine.execute_proposal(id)?);
        }
        Commands::Advance { seconds } => {
            let now = sim.clock.advance(seconds);
            println!("Clock advanced to {}", now);
        }
        Commands::List => {
            let proposals = sim.engine.proposals();
            if proposals.is_empty() {
                println!("No proposals");
            }
            for proposal in proposals {
                println!(
                    "#{} {:?} {} -> {} votes {} \"{}\"",
                    proposal.id,
                    proposal.state(sim.engine.now()),
                    proposal.amount,
                    proposal.recipient,
                    proposal.votes,
                    proposal.description
                );
            }
            return Ok(false);
        }
        Commands::Get { id } => {
            let proposal = sim.engine.proposal(id)?;
            println!("{}", serde_json::to_string_pretty(proposal)?);
            println!("State: {:?}", sim.engine.proposal_state(id)?);
            println!("Quorum reached: {}", sim.engine.quorum_reached(id)?);
            return Ok(false);
        }
        Commands::Balance { account } => {
            println!("Tokens:    {}", sim.token.balance_of(&account));
            println!("Deposited: {}", sim.engine.deposit_balance(&account));
            println!("Available: {}", sim.engine.available(&account));
            println!("Currency:  {}", sim.currency.balance_of(&account));
            return Ok(false);
        }
        Commands::Events => {
            for event in sim.engine.events() {
                println!("{}", event);
            }
            return Ok(false);
        }
    }
    Ok(true)
}
