use loon::app::RunOptions;
use loon::reddit::Category;

const HELP: &str = "Loon — Browse image posts from Reddit communities in a terminal gallery.

  --version,   -V          Show version and exit
  --help,      -h          Show this help message
  --subreddit, -r NAME     Subreddit to load first
  --category,  -c NAME     hot, new, top or controversial
  --print                  Load one page, print the posts and exit";

enum Mode {
    Exit,
    Interactive(RunOptions),
    Print(RunOptions),
}

fn main() {
    let result = match parse_args(std::env::args().skip(1)) {
        Ok(Mode::Exit) => return,
        Ok(Mode::Interactive(opts)) => loon::run(opts),
        Ok(Mode::Print(opts)) => loon::app::print(opts),
        Err(message) => {
            eprintln!("error: {message}\n\n{HELP}");
            std::process::exit(2);
        }
    };
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Mode, String> {
    let mut opts = RunOptions::default();
    let mut print = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Loon {}", loon::VERSION);
                return Ok(Mode::Exit);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(Mode::Exit);
            }
            "--subreddit" | "-r" => {
                let name = args.next().ok_or("--subreddit needs a value")?;
                opts.subreddit = Some(name);
            }
            "--category" | "-c" => {
                let key = args.next().ok_or("--category needs a value")?;
                let category =
                    Category::from_key(&key).ok_or(format!("unknown category: {key}"))?;
                opts.category = Some(category);
            }
            "--print" => print = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(if print {
        Mode::Print(opts)
    } else {
        Mode::Interactive(opts)
    })
}
