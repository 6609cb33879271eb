use super::Request;
use super::Response;
use crate::console::Emulator;
use crate::objective::Objectives;
use crate::search::evaluate;
use std::net::TcpListener;
use std::net::TcpStream;

/// host helper duty: answer evaluation requests over the wire until
/// the listener dies. any emulator satisfying the contract can serve,
/// as long as it is the same game build the master runs, since
/// savestates cross the wire raw.
pub fn serve<E: Emulator>(listener: TcpListener, emulator: E, objectives: Objectives) {
    log::info!(
        "serving helper duty on {}",
        listener.local_addr().map(|a| a.to_string()).unwrap_or_default()
    );
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => match handle(stream, &emulator, &objectives) {
                Ok(()) => {}
                Err(e) => log::warn!("helper request failed ({})", e),
            },
            Err(e) => log::warn!("helper accept failed ({})", e),
        }
    }
}

fn handle<E: Emulator>(
    mut stream: TcpStream,
    emulator: &E,
    objectives: &Objectives,
) -> anyhow::Result<()> {
    let request = Request::read(&mut stream)?;
    let outcome = evaluate::outcome(
        emulator,
        &request.state,
        &request.next,
        &request.futures,
        objectives,
    );
    let response = Response {
        immediate: outcome.immediate,
        per_future: outcome.futures,
    };
    response.write(&mut stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Input;
    use crate::console::Machine;
    use crate::objective::Objective;
    use crate::objective::Token;
    use crate::remote::Helpers;

    fn objectives() -> Objectives {
        Objectives::from(vec![Objective::new(1., vec![Token::new(0, false, false)])])
    }

    #[test]
    fn loopback_helper_matches_local_evaluation() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let machine = Machine::boot("loopback");
        std::thread::spawn({
            let machine = machine.clone();
            let objectives = objectives();
            move || serve(listener, machine, objectives)
        });

        let helpers = Helpers::probe("127.0.0.1", &[port]);
        assert_eq!(helpers.len(), 1);

        let state = machine.save();
        let nexts = vec![vec![Input::RIGHT; 10], vec![Input::LEFT; 10]];
        let futures = vec![vec![Input::RIGHT; 20], vec![Input::A; 20]];
        let responses = helpers.dispatch(&state, &nexts, &futures);
        for (next, response) in nexts.iter().zip(responses) {
            let response = response.expect("loopback helper answered");
            let local = evaluate::outcome(&machine, &state, next, &futures, &objectives());
            assert_eq!(response.immediate, local.immediate);
            assert_eq!(response.per_future, local.futures);
        }
    }
}
