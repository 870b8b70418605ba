use seird::{forecast, AdaptiveOptions, Compartment, Error, OdeError, SeirdParams, SolverConfig};

fn baseline(days: usize) -> SeirdParams {
    SeirdParams::new(59_000_000.0, 709.0, 0.0, 0.0, 2.3, 4.0, 14.0, 0.02, days)
}

fn non_increasing(v: &[i64]) -> bool {
    v.windows(2).all(|w| w[1] <= w[0])
}

fn non_decreasing(v: &[i64]) -> bool {
    v.windows(2).all(|w| w[1] >= w[0])
}

#[test]
fn baseline_two_week_forecast() {
    let traj = forecast::forecast(&baseline(14)).expect("baseline forecast");

    assert_eq!(traj.len(), 14);
    for c in Compartment::ALL {
        assert_eq!(traj.series(c).len(), 14, "{c} length");
    }
    assert!(non_increasing(&traj.susceptible));
    assert!(non_decreasing(&traj.deceased));
    assert!(traj.infected[1] > traj.infected[0], "infections should rise: {:?}", traj.infected);
    assert_eq!(traj.infected[0], 709);
}

#[test]
fn output_length_matches_requested_days() {
    for days in [1, 2, 7, 30, 120] {
        for solver in [SolverConfig::default(), SolverConfig::Rk4 { dt: 0.5 }] {
            let traj = forecast::run(&baseline(days), &solver).unwrap();
            assert_eq!(traj.len(), days);
            assert!(Compartment::ALL.iter().all(|c| traj.series(*c).len() == days));
        }
    }
}

#[test]
fn single_day_returns_rounded_initial_condition() {
    let traj = forecast::forecast(&baseline(1)).unwrap();
    // E0 = 0.575 * 709 = 407.675, S0 = N - I0 - E0.
    assert_eq!(traj.row(0), Some([58_998_883, 408, 709, 0, 0]));
    assert_eq!(traj.times, vec![0.0]);
}

#[test]
fn no_transmission_no_inflow_infections_decay() {
    let p = SeirdParams { reproduction_number: 0.0, ..baseline(60) };
    let sol = forecast::simulate(&p, &SolverConfig::default()).unwrap();
    let infected: Vec<f64> = sol.states.iter().map(|s| s.infected).collect();
    assert!(infected.windows(2).all(|w| w[1] <= w[0] + 1e-6), "{infected:?}");
    assert!(sol.states.iter().all(|s| s.exposed == 0.0));
}

#[test]
fn inflow_drives_infected_to_steady_state() {
    // Steady state balances i*N against gamma*I: I* = i*N/gamma = 1e-4 * 1e6 * 5 = 500.
    let p = SeirdParams::new(1_000_000.0, 0.0, 0.0, 0.0, 0.0, 4.0, 5.0, 0.01, 200).with_inflow(1e-4);
    let sol = forecast::simulate(&p, &SolverConfig::default()).unwrap();
    let last = sol.states.last().unwrap();
    assert!((last.infected - 500.0).abs() < 0.5, "I(end) = {}", last.infected);

    let traj = forecast::run(&p, &SolverConfig::default()).unwrap();
    assert!(non_decreasing(&traj.infected));
    assert_eq!(*traj.infected.last().unwrap(), 500);
}

#[test]
fn zero_fatality_keeps_deceased_fixed() {
    let p = SeirdParams {
        case_fatality_rate: 0.0,
        deceased: 12.0,
        ..baseline(40)
    };
    let traj = forecast::forecast(&p).unwrap();
    assert!(traj.deceased.iter().all(|d| *d == 12));
}

#[test]
fn population_is_conserved_without_inflow() {
    let p = baseline(90);
    let sol = forecast::simulate(&p, &SolverConfig::default()).unwrap();
    for s in &sol.states {
        assert!((s.total() - p.population).abs() / p.population < 1e-6, "total {}", s.total());
    }
}

#[test]
fn adaptive_and_fixed_step_agree() {
    let p = baseline(60);
    let a = forecast::simulate(&p, &SolverConfig::default()).unwrap();
    let b = forecast::simulate(&p, &SolverConfig::Rk4 { dt: 0.05 }).unwrap();
    for (x, y) in a.states.iter().zip(&b.states) {
        for c in Compartment::ALL {
            let (u, v) = (x.get(c), y.get(c));
            assert!((u - v).abs() <= 1e-3 * u.abs().max(1.0), "{c}: {u} vs {v}");
        }
    }
}

#[test]
fn degenerate_incubation_is_rejected_up_front() {
    let p = SeirdParams { incubation_period: 0.0, ..baseline(14) };
    let err = forecast::forecast(&p).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { name: "incubation_period", .. }));
}

#[test]
fn empty_mixing_pool_surfaces_integration_failure() {
    // Everyone starts deceased, so S+I+R = 0 and the infection term is 0/0.
    let p = SeirdParams::new(100.0, 0.0, 0.0, 100.0, 1.0, 4.0, 10.0, 0.0, 5);
    for solver in [SolverConfig::default(), SolverConfig::Rk4 { dt: 0.5 }] {
        let err = forecast::run(&p, &solver).unwrap_err();
        assert!(
            matches!(err, Error::Integration(OdeError::NonFinite { .. })),
            "unexpected {err:?}"
        );
    }
}

#[test]
fn near_instant_incubation_completes_a_year() {
    // alpha = 1000/day against gamma = 1/14: stiff enough that an explicit
    // method alone runs out of steps.
    let p = SeirdParams { incubation_period: 0.001, ..baseline(365) };
    let sol = forecast::simulate(&p, &SolverConfig::default()).expect("stiff forecast");
    assert!(sol.stats.stiff_switch_at.is_some());

    let traj = forecast::forecast(&p).expect("stiff forecast");
    assert_eq!(traj.len(), 365);
    assert!(non_increasing(&traj.susceptible));
    assert!(non_decreasing(&traj.deceased));
    let last = traj.row(364).unwrap();
    assert!((last[4] - 1_180_000).abs() <= 1, "{last:?}");
    assert!((last.iter().sum::<i64>() - 59_000_000).abs() <= 2, "{last:?}");

    let explicit = SolverConfig::Dopri5(AdaptiveOptions::default());
    let err = forecast::run(&p, &explicit).unwrap_err();
    assert!(
        matches!(err, Error::Integration(OdeError::MaxStepsExceeded { .. })),
        "unexpected {err:?}"
    );
}

#[test]
fn baseline_year_stays_on_the_explicit_method() {
    let sol = forecast::simulate(&baseline(365), &SolverConfig::default()).unwrap();
    assert_eq!(sol.stats.stiff_switch_at, None);
}

#[test]
fn default_tolerance_resolves_whole_people() {
    let p = baseline(120);
    let tight = SolverConfig::Dopri5(AdaptiveOptions {
        rtol: 1e-12,
        atol: 1e-9,
        max_steps: 10_000_000,
        ..AdaptiveOptions::default()
    });
    let a = forecast::forecast(&p).unwrap();
    let b = forecast::run(&p, &tight).unwrap();
    for c in Compartment::ALL {
        for (day, (u, v)) in a.series(c).iter().zip(b.series(c)).enumerate() {
            assert!((u - v).abs() <= 1, "{c} day {day}: {u} vs {v}");
        }
    }
}
