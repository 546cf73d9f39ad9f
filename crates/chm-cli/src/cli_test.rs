use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    Cli::command().debug_assert();
}

#[test]
fn test_parse_up_with_dry_run() {
    let cli = Cli::parse_from(["chm", "migration:up", "--path=./migrations", "--dry-run"]);
    match cli.command {
        Commands::Up(args) => {
            assert_eq!(args.path.as_deref(), Some("./migrations"));
            assert!(args.dry_run);
        }
        other => panic!("expected migration:up, got {:?}", other),
    }
}

#[test]
fn test_parse_create() {
    let cli = Cli::parse_from(["chm", "migration:create", "add_users", "--path", "db"]);
    match cli.command {
        Commands::Create(args) => {
            assert_eq!(args.name, "add_users");
            assert_eq!(args.path.as_deref(), Some("db"));
        }
        other => panic!("expected migration:create, got {:?}", other),
    }
}

#[test]
fn test_down_requires_file() {
    assert!(Cli::try_parse_from(["chm", "migration:down", "--path=db"]).is_err());
    let cli = Cli::parse_from(["chm", "-v", "migration:down", "--file=a.sql"]);
    assert!(cli.global.verbose);
    assert!(matches!(cli.command, Commands::Down(ref args) if args.file == "a.sql"));
}

#[test]
fn test_dump_requires_out() {
    assert!(Cli::try_parse_from(["chm", "dump"]).is_err());
    let cli = Cli::parse_from(["chm", "dump", "--out=schema.sql"]);
    assert!(matches!(cli.command, Commands::Dump(ref args) if args.out == PathBuf::from("schema.sql")));
}
