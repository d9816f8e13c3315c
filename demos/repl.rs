use malrs::Error;
use malrs::ast::{Symbol, Value};
use malrs::evaluator::{self, Environment};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    // Deep non-tail recursion needs more stack than the main thread has
    let result = panic::catch_unwind(|| malrs::run_with_large_stack(run));

    if let Ok(Err(e)) = &result {
        eprintln!("Could not start the interpreter thread: {e}");
        process::exit(1);
    }

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run() {
    let env = evaluator::create_global_env();

    // Register custom function that can be called from user code for demonstration purposes
    env.register_builtin_operation::<_, ()>("help", print_help);

    // `repl FILE ARGS...` loads FILE with *ARGV* bound to ARGS, then exits
    let mut args = std::env::args().skip(1);
    if let Some(path) = args.next() {
        let argv: Vec<Value> = args.map(Value::from).collect();
        env.set(Symbol::get_or_create("*ARGV*"), Value::list(argv));

        let load = Value::list(vec![
            Value::Symbol(Symbol::get_or_create("load-file")),
            Value::from(path),
        ]);
        if let Err(e) = evaluator::eval(&load, &env) {
            eprintln!("Error: {e}");
            process::exit(1);
        }
        return;
    }

    run_repl(&env);
}

fn run_repl(env: &Environment) {
    println!("malrs - a small Lisp interpreter");
    println!("Enter forms like: (+ 1 2) or (def! inc (fn* (x) (+ x 1)))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");

    loop {
        match rl.readline("user> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                // Handle special commands
                match line {
                    ":help" => {
                        _ = print_help().is_ok();
                        continue;
                    }
                    ":env" => {
                        print_environment(env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // One failing form never ends the session
                match malrs::rep(line, env) {
                    Ok(Some(output)) => println!("{output}"),
                    Ok(None) => {}
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() -> Result<Value, Error> {
    println!("malrs commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  def! let* do if fn* quote quasiquote eval");
    println!();
    println!("Reader macros:");
    println!("  'x (quote)  `x (quasiquote)  ~x (unquote)  ~@x (splice-unquote)  @x (deref)");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (let* [a 1 b (+ a 1)] (list a b))");
    println!("  (def! fact (fn* (n) (if (<= n 1) 1 (* n (fact (- n 1))))))");
    println!("  `(1 ~(+ 1 1) ~@(list 3 4))");
    println!("  (load-file \"script.mal\")");
    println!();

    Ok(Value::Nil)
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::NativeFunction { .. } => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    // Print built-in functions
    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {:<15}", name.name());
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    // Print user-defined values
    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
