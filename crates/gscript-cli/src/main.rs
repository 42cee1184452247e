use std::{
    env, fs,
    io::Read as _,
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

use gscript::{AtomicCancellation, GscriptError, NoopTracer, Runtime};

struct Args {
    file: Option<String>,
    cpuprofile: Option<String>,
    timelimit: f64,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut file = None;
    let mut cpuprofile = None;
    let mut timelimit = 0.0;

    for a in raw {
        if let Some(value) = a.strip_prefix("--cpuprofile=") {
            cpuprofile = Some(value.to_string());
        } else if let Some(value) = a.strip_prefix("--timelimit=") {
            timelimit = value.parse::<f64>().map_err(|_| format!("invalid --timelimit value: {value}"))?;
        } else if file.is_none() {
            file = Some(a.clone());
        } else {
            return Err(format!("unexpected argument: {a}"));
        }
    }

    Ok(Args { file, cpuprofile, timelimit })
}

fn read_source(file: Option<&str>) -> Result<String, String> {
    match file {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map_err(|err| format!("error reading stdin: {err}"))?;
            Ok(buf)
        }
        Some(path) => fs::read_to_string(path).map_err(|err| format!("error reading {path}: {err}")),
    }
}

fn main() -> ExitCode {
    let raw_args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw_args) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(64);
        }
    };

    let source = match read_source(args.file.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(64);
        }
    };

    let profiler_guard = args.cpuprofile.as_ref().map(|_| {
        pprof::ProfilerGuardBuilder::default()
            .frequency(1000)
            .blocklist(&["libc", "libgcc", "pthread", "vdso"])
            .build()
            .expect("cpu profiler failed to start")
    });

    let cancellation = AtomicCancellation::new();
    if args.timelimit > 0.0 {
        let timer_handle = cancellation.clone();
        let limit = Duration::from_secs_f64(args.timelimit);
        thread::spawn(move || {
            thread::sleep(limit);
            timer_handle.cancel();
        });
    }

    let mut rt = Runtime::with_parts(cancellation, NoopTracer);

    let start = Instant::now();
    let result = rt.run_string(&source);
    let elapsed = start.elapsed();

    if let Some(guard) = profiler_guard {
        if let Ok(report) = guard.report().build() {
            let path = args.cpuprofile.as_ref().expect("profiler only started when --cpuprofile was given");
            match fs::File::create(path) {
                Ok(file) => {
                    if let Err(err) = report.flamegraph(file) {
                        eprintln!("warning: failed to write flamegraph to {path}: {err}");
                    }
                }
                Err(err) => eprintln!("warning: failed to create {path}: {err}"),
            }
        }
    }

    match result {
        Ok(value) => {
            println!("{}", value.to_display_string());
            eprintln!("ran in {elapsed:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", describe(&err));
            ExitCode::from(64)
        }
    }
}

fn describe(err: &GscriptError) -> String {
    match err {
        GscriptError::Syntax(e) => format!("syntax error:\n{e}"),
        GscriptError::Compile(e) => format!("compile error:\n{e}"),
        GscriptError::Runtime(e) => format!("runtime error: {e}"),
    }
}
