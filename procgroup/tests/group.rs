mod group {
    pub mod helpers;

    mod barrier;
    mod explicit;
    mod failure;
    mod from_env;
    mod mean_reduce;
}
