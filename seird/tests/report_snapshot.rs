use seird::io::report::{write_forecast_report, write_forecast_report_file};
use seird::{forecast, SeirdParams};

#[test]
fn forecast_report_snapshot_small() {
    // No one infected or exposed: every compartment stays at its initial value.
    let params = SeirdParams::new(1000.0, 0.0, 100.0, 5.0, 2.0, 4.0, 10.0, 0.01, 3);
    let traj = forecast::forecast(&params).expect("forecast");

    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_forecast_report_file(tmp.path(), "TEST-SMALL", &params, &traj).expect("write report");
    assert!(path.ends_with("seird_TEST-SMALL.csv"));

    let s = std::fs::read_to_string(path).expect("read report");
    insta::assert_snapshot!(s, @r"
run_id=TEST-SMALL
population=1000
initial_infected=0
initial_recovered=100
initial_deceased=5
reproduction_number=2.000000
incubation_period_days=4.000000
infectious_period_days=10.000000
case_fatality_rate=0.010000
inflow_rate=0.000000
forecast_days=3

day,t,susceptible,exposed,infected,recovered,deceased
0,0.000000,895,0,0,100,5
1,1.500000,895,0,0,100,5
2,3.000000,895,0,0,100,5
");
}

#[test]
fn forecast_report_snapshot_baseline_two_weeks() {
    let params = SeirdParams::new(59_000_000.0, 709.0, 0.0, 0.0, 2.3, 4.0, 14.0, 0.02, 14);
    let traj = forecast::forecast(&params).expect("forecast");

    let mut buf = Vec::new();
    write_forecast_report(&mut buf, "BASELINE", &params, &traj).expect("write report");
    let s = String::from_utf8(buf).expect("utf8 report");
    insta::assert_snapshot!(s, @r"
run_id=BASELINE
population=59000000
initial_infected=709
initial_recovered=0
initial_deceased=0
reproduction_number=2.300000
incubation_period_days=4.000000
infectious_period_days=14.000000
case_fatality_rate=0.020000
inflow_rate=0.000000
forecast_days=14

day,t,susceptible,exposed,infected,recovered,deceased
0,0.000000,58998883,408,709,0,0
1,1.076923,58998419,720,804,57,1
2,2.153846,58997873,1030,971,123,3
3,3.230769,58997202,1379,1211,205,4
4,4.307692,58996357,1798,1531,308,6
5,5.384615,58995285,2318,1950,438,9
6,6.461538,58993918,2976,2489,605,12
7,7.538462,58992171,3814,3182,817,17
8,8.615385,58989938,4882,4069,1089,22
9,9.692308,58987081,6248,5205,1437,29
10,10.769231,58983427,7994,6658,1882,38
11,11.846154,58978753,10228,8518,2451,50
12,12.923077,58972773,13085,10898,3179,65
13,14.000000,58965123,16741,13942,4111,84
");
}
