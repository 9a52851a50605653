//! Pairs a job's control parameters with its typed arguments.
//!
//! The trigger engine only ever sees an opaque zero-argument callable. This
//! module is what lets that callable carry the lock identity, expiry and
//! retention policy next to the user's own arguments, and hand a fresh copy
//! of those arguments to the job body on every tick.
//!
//! Arguments are a single typed value `A` (use a tuple for several), and the
//! job body is `Fn(A) -> Future`. Registering a body with arguments of the
//! wrong shape therefore fails to compile instead of failing at the first tick.

use std::future::Future;

use crate::types::JobParams;

pub struct ParameterPipeline<F, A> {
    params: JobParams,
    job: F,
    args: A,
}

impl<F, A> ParameterPipeline<F, A>
where
    A: Clone,
{
    /// Bind `job` and its arguments under `params`.
    pub fn encode(params: JobParams, job: F, args: A) -> Self {
        Self { params, job, args }
    }

    /// Control parameters plus a fresh copy of the arguments, in registration order.
    pub fn decode(&self) -> (&JobParams, A) {
        (&self.params, self.args.clone())
    }

    pub fn params(&self) -> &JobParams {
        &self.params
    }

    /// Call the job body with `args`.
    pub fn call<Fut>(&self, args: A) -> Fut
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        (self.job)(args)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::types::RetentionPolicy;

    fn params() -> JobParams {
        JobParams::new("nightly-report", Duration::from_secs(5), RetentionPolicy::KeepLocked)
            .unwrap()
    }

    #[test]
    fn decode_returns_what_was_encoded() {
        let args = (7_u32, "eu-west".to_string(), vec![1_u8, 2, 3]);
        let pipeline = ParameterPipeline::encode(
            params(),
            |_: (u32, String, Vec<u8>)| async {},
            args.clone(),
        );

        let (decoded_params, decoded_args) = pipeline.decode();
        assert_eq!(decoded_params, &params());
        assert_eq!(decoded_args, args);
    }

    #[tokio::test]
    async fn call_passes_arguments_through_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = ParameterPipeline::encode(
            params(),
            move |(a, b): (&'static str, &'static str)| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().extend([a, b]);
                }
            },
            ("first", "second"),
        );

        let (_, args) = pipeline.decode();
        pipeline.call(args).await;
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn every_call_gets_a_fresh_copy() {
        let pipeline = ParameterPipeline::encode(
            params(),
            |mut v: Vec<u32>| async move {
                v.push(1);
                v.len()
            },
            Vec::new(),
        );

        for _ in 0..3 {
            let (_, args) = pipeline.decode();
            assert_eq!(pipeline.call(args).await, 1);
        }
    }
}
