//! CLI for interacting with confidential sealed-bid auctions.
//!
//! This binary provides commands for:
//! - Creating and closing auctions
//! - Placing encrypted bids
//! - Requesting finalization and relaying oracle responses
//! - Querying auction status, statistics and events

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use auction_client::AuctionClient;
use auction_types::rpc::{AuctionRpc, AuctionStatsRpc};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for confidential sealed-bid auctions")]
struct Cli {
    /// Mock chain RPC endpoint
    #[arg(long, env = "AUCTION_RPC", default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new auction
    Create {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        /// Auction name
        #[arg(long)]
        name: String,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,

        /// Bidding deadline (unix timestamp)
        #[arg(long)]
        deadline: u64,
    },

    /// Place an encrypted bid
    Bid {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,

        /// Bid amount (encrypted before submission)
        #[arg(long)]
        amount: u64,
    },

    /// Close an auction before its deadline (creator only)
    Close {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Request decryption of the bids and finalization
    Finalize {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Expire a decryption request that outlived the timeout
    Expire {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Get revealed statistics
    Stats {
        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Get the winner
    Winner {
        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Get auction details
    GetAuction {
        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// List auctions
    List {
        #[arg(long)]
        offset: Option<u64>,

        #[arg(long)]
        limit: Option<u64>,
    },

    /// Get bids for an auction
    Bids {
        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Show the event log
    Events {
        /// First sequence number to show
        #[arg(long, default_value_t = 0)]
        since: u64,

        #[arg(long)]
        limit: Option<u64>,
    },

    /// Show in-flight decryption requests
    Pending,

    /// Advance chain time (for testing)
    AdvanceBlock,

    /// Set chain timestamp (for testing)
    SetTimestamp {
        /// Unix timestamp to set
        #[arg(long)]
        timestamp: u64,
    },

    /// Deliver fulfilled oracle responses now
    Relay,
}

fn print_auction(a: &AuctionRpc) {
    println!("Auction {}:", a.auction_id);
    println!("  Name: {}", a.name);
    if let Some(description) = &a.description {
        println!("  Description: {}", description);
    }
    println!("  Phase: {}", a.phase);
    println!("  Creator: {}", a.creator);
    println!("  Deadline: {}", a.deadline);
    println!("  Bids: {}", a.bid_count);
    if let Some(request_id) = a.pending_request {
        println!("  Pending Request: {}", request_id);
    }
}

fn print_stats(auction_id: u64, s: &AuctionStatsRpc) {
    println!("Statistics for auction {}:", auction_id);
    println!("  Bids: {}", s.bid_count);
    println!("  High: {}", s.high);
    println!("  Low: {}", s.low);
    println!("  Average: {}", s.average);
    println!("  Sum: {}", s.sum);
    match (&s.winner, s.winner_index) {
        (Some(winner), Some(index)) => println!("  Winner: {} (bid {})", winner, index),
        _ => println!("  Winner: none"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = AuctionClient::new(&cli.rpc)?;

    match cli.command {
        Commands::Create {
            sender,
            name,
            description,
            deadline,
        } => {
            let auction_id = client
                .create_auction(&sender, &name, description, deadline)
                .await?;
            info!("Created auction with ID: {}", auction_id);
            println!("Auction ID: {}", auction_id);
        }

        Commands::Bid {
            sender,
            auction_id,
            amount,
        } => {
            let index = client.place_bid(&sender, auction_id, amount).await?;
            info!("Bid placed on auction {}", auction_id);
            println!("Bid placed successfully");
            println!("  Auction ID: {}", auction_id);
            println!("  Bid Index: {}", index);
            println!("  Amount: {} (encrypted)", amount);
        }

        Commands::Close { sender, auction_id } => {
            client.close_auction(&sender, auction_id).await?;
            println!("Auction {} closed", auction_id);
        }

        Commands::Finalize { sender, auction_id } => {
            let outcome = client.request_finalize(&sender, auction_id).await?;
            match (outcome.stats, outcome.request_id) {
                (Some(stats), _) => {
                    println!("Auction {} finalized without bids", auction_id);
                    print_stats(auction_id, &stats);
                }
                (None, Some(request_id)) => {
                    println!("Decryption requested: request {}", request_id);
                }
                (None, None) => println!("Finalization returned no outcome"),
            }
        }

        Commands::Expire { sender, auction_id } => {
            let request_id = client.expire_decryption(&sender, auction_id).await?;
            println!("Expired decryption request {}", request_id);
        }

        Commands::Stats { auction_id } => {
            let stats = client.get_stats(auction_id).await?;
            print_stats(auction_id, &stats);
        }

        Commands::Winner { auction_id } => {
            let winner = client.get_winner(auction_id).await?;
            match (winner.winner, winner.winner_index) {
                (Some(address), Some(index)) => {
                    println!("Winner of auction {}:", auction_id);
                    println!("  Address: {}", address);
                    println!("  Bid: {}", winner.winning_bid);
                    println!("  Index: {}", index);
                }
                _ => println!("Auction {} finalized without bids", auction_id),
            }
        }

        Commands::GetAuction { auction_id } => match client.get_auction(auction_id).await? {
            Some(a) => print_auction(&a),
            None => println!("Auction {} not found", auction_id),
        },

        Commands::List { offset, limit } => {
            let auctions = client.list_auctions(offset, limit).await?;
            if auctions.is_empty() {
                println!("No auctions found");
            } else {
                println!("Auctions:");
                for a in auctions {
                    println!(
                        "  [{}] {} - {} ({} bids, deadline {})",
                        a.auction_id, a.name, a.phase, a.bid_count, a.deadline
                    );
                }
            }
        }

        Commands::Bids { auction_id } => {
            let bids = client.get_bids(auction_id).await?;
            if bids.is_empty() {
                println!("No bids for auction {}", auction_id);
            } else {
                println!("Bids for auction {}:", auction_id);
                for bid in bids {
                    println!("  [{}] Bidder: {}", bid.index, bid.bidder);
                    println!("      Handle: {}", bid.amount);
                    println!("      Submitted: {}", bid.submitted_at);
                }
            }
        }

        Commands::Events { since, limit } => {
            for e in client.get_events(since, limit).await? {
                println!(
                    "  #{} t={} auction={} {} {}",
                    e.sequence, e.timestamp, e.auction_id, e.kind, e.detail
                );
            }
        }

        Commands::Pending => {
            let pending = client.get_pending_decryptions().await?;
            if pending.is_empty() {
                println!("No pending decryptions");
            }
            for p in pending {
                let status = if p.expired { "expired" } else { "waiting" };
                println!(
                    "  request {} auction {} ({} handles, requested at {}, {})",
                    p.request_id, p.auction_id, p.handle_count, p.requested_at, status
                );
            }
        }

        Commands::AdvanceBlock => {
            let info = client.advance_block().await?;
            println!("Block advanced: height={}, timestamp={}", info.height, info.timestamp);
        }

        Commands::SetTimestamp { timestamp } => {
            client.set_timestamp(timestamp).await?;
            println!("Timestamp set to {}", timestamp);
        }

        Commands::Relay => {
            let report = client.relay().await?;
            println!("Delivered: {:?}", report.delivered);
            for (request_id, reason) in report.rejected {
                println!("Rejected {}: {}", request_id, reason);
            }
        }
    }

    Ok(())
}
