mod boundaries;
mod equivalence;
mod round_trip;
