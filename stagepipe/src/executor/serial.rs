//! In-process lazy execution.

use std::sync::Arc;

use stagepipe_shared::errors::StageResult;

use super::metrics::{RunMetrics, RunRecorder};
use super::{BoxedInput, LazyRun, Task};
use crate::stage::ExecutionMode;
use crate::transform::{TaskContext, Transform};

/// Applies the transformation on the consumer's thread, pulling the next
/// input only when the next output is requested.
pub(crate) struct SerialRun<T: Transform> {
    transform: Arc<T>,
    input: Option<BoxedInput<T::Input>>,
    options: Arc<T::Options>,
    stage: Arc<str>,
    verbose: bool,
    position: usize,
    recorder: RunRecorder,
}

impl<T: Transform> SerialRun<T> {
    pub(crate) fn new(
        transform: Arc<T>,
        input: BoxedInput<T::Input>,
        options: Arc<T::Options>,
        stage: Arc<str>,
        verbose: bool,
    ) -> Self {
        let recorder = RunRecorder::start(Arc::clone(&stage), ExecutionMode::Sequential, verbose);
        Self {
            transform,
            input: Some(input),
            options,
            stage,
            verbose,
            position: 0,
            recorder,
        }
    }

    fn finish(&mut self) {
        self.input = None;
        self.recorder.finish(0);
    }
}

impl<T: Transform> Iterator for SerialRun<T> {
    type Item = StageResult<T::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.input.as_mut()?.next();

        let result = match next {
            None => {
                self.finish();
                return None;
            }
            Some(Err(upstream)) => Err(upstream),
            Some(Ok(item)) => {
                let context = TaskContext::new(
                    Arc::clone(&self.options),
                    Arc::clone(&self.stage),
                    self.position,
                );
                self.recorder.record_submitted();
                let _active = self.recorder.tracker().enter();
                Task::<T>::new(item, context).run(&self.transform, self.verbose)
            }
        };
        self.position += 1;

        self.recorder.record_yield(&result);
        if result.is_err() {
            self.finish();
        }
        Some(result)
    }
}

impl<T: Transform> LazyRun<T::Output> for SerialRun<T> {
    fn close(&mut self) {
        self.finish();
    }

    fn metrics(&self) -> RunMetrics {
        self.recorder.snapshot()
    }
}

impl<T: Transform> Drop for SerialRun<T> {
    fn drop(&mut self) {
        self.finish();
    }
}
